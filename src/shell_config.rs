use std::{env, fs, path::PathBuf};

use serde::Deserialize;

use crate::SHELL_CONFIG_PATH_ENV;

/// Persisted local preferences, read once at startup. Unknown fields are
/// ignored; a missing or unreadable file means all-defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShellPreferences {
    pub minimize_to_tray: bool,
}

pub fn resolve_preferences_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var(SHELL_CONFIG_PATH_ENV) {
        let candidate = PathBuf::from(custom.trim());
        if !candidate.as_os_str().is_empty() {
            return Some(candidate);
        }
    }

    home::home_dir().map(|home_dir| home_dir.join(".config").join("app_config.json"))
}

pub fn load_preferences<F>(log: F) -> ShellPreferences
where
    F: Fn(&str) + Copy,
{
    let Some(path) = resolve_preferences_path() else {
        log("no home directory available, using default preferences");
        return ShellPreferences::default();
    };
    load_preferences_from(&path, log)
}

pub fn load_preferences_from<F>(path: &std::path::Path, log: F) -> ShellPreferences
where
    F: Fn(&str) + Copy,
{
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                log(&format!(
                    "failed to read preferences {}: {}",
                    path.display(),
                    error
                ));
            }
            return ShellPreferences::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(preferences) => preferences,
        Err(error) => {
            log(&format!(
                "failed to parse preferences {}: {}, using defaults",
                path.display(),
                error
            ));
            ShellPreferences::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_camel_case_preferences() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("app_config.json");
        fs::write(&path, r#"{"minimizeToTray": true, "theme": "dark"}"#).expect("write config");

        let preferences = load_preferences_from(&path, |_m| {});
        assert!(preferences.minimize_to_tray);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("does_not_exist.json");

        let preferences = load_preferences_from(&path, |_m| {});
        assert_eq!(preferences, ShellPreferences::default());
    }

    #[test]
    fn unparsable_file_yields_defaults_and_logs() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("app_config.json");
        fs::write(&path, b"{not json").expect("write config");

        let logged = std::sync::Mutex::new(Vec::new());
        let preferences = load_preferences_from(&path, |message| {
            logged.lock().expect("lock log lines").push(message.to_string());
        });

        assert_eq!(preferences, ShellPreferences::default());
        let lines = logged.lock().expect("lock log lines");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("failed to parse preferences"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("app_config.json");
        fs::write(&path, b"{}").expect("write config");

        let preferences = load_preferences_from(&path, |_m| {});
        assert!(!preferences.minimize_to_tray);
    }
}
