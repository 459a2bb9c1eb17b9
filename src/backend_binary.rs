use std::{
    env,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::OnceLock,
};

use crate::{error::ShellError, BACKEND_BUILD_ROOT_ENV, BACKEND_CMD_ENV};

/// What to execute and how. `launcher` is only populated on macOS when the
/// x86_64 binary has to run through Rosetta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub executable: PathBuf,
    pub launcher: Option<String>,
    pub launcher_args: Vec<String>,
}

impl BackendTarget {
    pub fn direct(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            launcher: None,
            launcher_args: Vec::new(),
        }
    }

    pub fn command_line(&self) -> (String, Vec<String>) {
        match &self.launcher {
            Some(launcher) => (launcher.clone(), self.launcher_args.clone()),
            None => (self.executable.to_string_lossy().to_string(), Vec::new()),
        }
    }
}

/// Memoized Rosetta detection; the probe runs at most once per process.
#[derive(Debug, Default)]
pub struct RosettaProbe {
    cached: OnceLock<bool>,
}

impl RosettaProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed<F>(&self, probe: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        *self.cached.get_or_init(probe)
    }

    /// Runs a trivial command under the x86_64 translation layer.
    pub fn is_installed_on_host<F>(&self, log: F) -> bool
    where
        F: Fn(&str),
    {
        self.is_installed(|| {
            let status = Command::new("arch")
                .args(["-x86_64", "true"])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            let installed = matches!(&status, Ok(exit) if exit.success());
            log(&format!("rosetta probe result: installed={installed}"));
            installed
        })
    }
}

/// Resolves the packaged backend executable for a host platform. `os` and
/// `arch` take the `std::env::consts::{OS, ARCH}` spellings.
pub fn resolve_backend_target<F>(
    os: &str,
    arch: &str,
    build_root: &Path,
    rosetta_installed: F,
) -> Result<BackendTarget, ShellError>
where
    F: FnOnce() -> bool,
{
    match os {
        "windows" => existing_target(build_root.join("app").join("app").join("app.exe"), None),
        "linux" => existing_target(build_root.join("app-linux").join("app_linux_bin"), None),
        "macos" => resolve_macos_target(arch, build_root, rosetta_installed),
        other => Err(ShellError::UnsupportedPlatform {
            os: other.to_string(),
        }),
    }
}

fn resolve_macos_target<F>(
    arch: &str,
    build_root: &Path,
    rosetta_installed: F,
) -> Result<BackendTarget, ShellError>
where
    F: FnOnce() -> bool,
{
    let arm_path = build_root.join("app-mac-arm64").join("app_mac_bin_arm64");
    let x64_path = build_root.join("app-mac-x86_64").join("app_mac_bin_x86_64");

    if arch == "aarch64" {
        if arm_path.is_file() {
            return Ok(BackendTarget::direct(arm_path));
        }
        if x64_path.is_file() {
            // Alternate-architecture fallback is only usable through the
            // translation layer; without it the binary cannot run at all.
            if rosetta_installed() {
                return Ok(BackendTarget {
                    launcher: Some("arch".to_string()),
                    launcher_args: vec![
                        "-x86_64".to_string(),
                        x64_path.to_string_lossy().to_string(),
                    ],
                    executable: x64_path,
                });
            }
            return Err(ShellError::BinaryNotFound {
                path: arm_path,
                hint: Some(
                    "An x86_64 backend binary exists but Rosetta 2 is not installed. \
                     Install it with: softwareupdate --install-rosetta"
                        .to_string(),
                ),
            });
        }
        return Err(ShellError::BinaryNotFound {
            path: arm_path,
            hint: None,
        });
    }

    existing_target(x64_path, None)
}

fn existing_target(path: PathBuf, hint: Option<String>) -> Result<BackendTarget, ShellError> {
    if path.is_file() {
        Ok(BackendTarget::direct(path))
    } else {
        Err(ShellError::BinaryNotFound { path, hint })
    }
}

/// Splits a user-supplied command override into a target, skipping the
/// platform resolver and its existence check.
pub fn resolve_custom_target(raw: &str) -> Result<BackendTarget, ShellError> {
    let mut pieces = shlex::split(raw)
        .ok_or_else(|| ShellError::InvalidBackendCommand(raw.to_string()))?;
    if pieces.is_empty() {
        return Err(ShellError::InvalidBackendCommand(raw.to_string()));
    }

    let executable = PathBuf::from(pieces.remove(0));
    if pieces.is_empty() {
        return Ok(BackendTarget::direct(executable));
    }

    // Extra arguments ride along by treating the executable itself as the
    // launcher, mirroring how the Rosetta wrapper is expressed.
    Ok(BackendTarget {
        launcher: Some(executable.to_string_lossy().to_string()),
        launcher_args: pieces,
        executable,
    })
}

/// Packaged binary directory: env override, then `build/` next to the shell
/// executable, then `build/` under the working directory.
pub fn backend_build_root() -> PathBuf {
    if let Some(custom) = env::var_os(BACKEND_BUILD_ROOT_ENV) {
        let candidate = PathBuf::from(custom);
        if !candidate.as_os_str().is_empty() {
            return candidate;
        }
    }

    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let candidate = exe_dir.join("build");
            if candidate.is_dir() {
                return candidate;
            }
        }
    }

    env::current_dir()
        .map(|cwd| cwd.join("build"))
        .unwrap_or_else(|_| PathBuf::from("build"))
}

/// Resolver entry used by startup; the env override wins.
pub fn resolve_startup_target<F>(rosetta: &RosettaProbe, log: F) -> Result<BackendTarget, ShellError>
where
    F: Fn(&str) + Copy,
{
    if let Some(custom_cmd) = env::var(BACKEND_CMD_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    {
        log(&format!("using backend command override: {custom_cmd}"));
        return resolve_custom_target(&custom_cmd);
    }

    let build_root = backend_build_root();
    resolve_backend_target(env::consts::OS, env::consts::ARCH, &build_root, || {
        rosetta.is_installed_on_host(log)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn place_binary(root: &Path, relative: &[&str]) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in relative {
            path = path.join(part);
        }
        fs::create_dir_all(path.parent().expect("binary parent")).expect("create fixture dirs");
        fs::write(&path, b"#!binary").expect("write fixture binary");
        path
    }

    #[test]
    fn resolves_windows_and_linux_binaries_when_present() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let win = place_binary(dir.path(), &["app", "app", "app.exe"]);
        let linux = place_binary(dir.path(), &["app-linux", "app_linux_bin"]);

        let target = resolve_backend_target("windows", "x86_64", dir.path(), || false)
            .expect("windows target");
        assert_eq!(target.executable, win);
        assert_eq!(target.launcher, None);

        let target =
            resolve_backend_target("linux", "x86_64", dir.path(), || false).expect("linux target");
        assert_eq!(target.executable, linux);
        assert_eq!(target.command_line().0, linux.to_string_lossy());
    }

    #[test]
    fn missing_binary_is_binary_not_found() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let error = resolve_backend_target("linux", "x86_64", dir.path(), || false)
            .expect_err("should fail");
        assert!(matches!(error, ShellError::BinaryNotFound { .. }));
    }

    #[test]
    fn unsupported_platform_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let error = resolve_backend_target("freebsd", "x86_64", dir.path(), || true)
            .expect_err("should fail");
        assert!(matches!(
            error,
            ShellError::UnsupportedPlatform { os } if os == "freebsd"
        ));
    }

    #[test]
    fn macos_prefers_native_arm_binary() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let arm = place_binary(dir.path(), &["app-mac-arm64", "app_mac_bin_arm64"]);
        place_binary(dir.path(), &["app-mac-x86_64", "app_mac_bin_x86_64"]);

        let target = resolve_backend_target("macos", "aarch64", dir.path(), || {
            panic!("rosetta probe must not run when the native binary exists")
        })
        .expect("native target");
        assert_eq!(target.executable, arm);
        assert_eq!(target.launcher, None);
    }

    #[test]
    fn macos_arm_falls_back_through_rosetta_launcher() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let x64 = place_binary(dir.path(), &["app-mac-x86_64", "app_mac_bin_x86_64"]);

        let target = resolve_backend_target("macos", "aarch64", dir.path(), || true)
            .expect("fallback target");
        assert_eq!(target.launcher.as_deref(), Some("arch"));
        let (program, args) = target.command_line();
        assert_eq!(program, "arch");
        assert_eq!(args, vec!["-x86_64".to_string(), x64.to_string_lossy().to_string()]);
    }

    #[test]
    fn macos_arm_without_rosetta_reports_hint() {
        let dir = tempfile::tempdir().expect("create temp dir");
        place_binary(dir.path(), &["app-mac-x86_64", "app_mac_bin_x86_64"]);

        let error = resolve_backend_target("macos", "aarch64", dir.path(), || false)
            .expect_err("should fail");
        let hint = error.remediation_hint().expect("hint expected");
        assert!(hint.contains("softwareupdate --install-rosetta"));
    }

    #[test]
    fn macos_x86_64_uses_the_x64_binary_directly() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let x64 = place_binary(dir.path(), &["app-mac-x86_64", "app_mac_bin_x86_64"]);

        let target = resolve_backend_target("macos", "x86_64", dir.path(), || false)
            .expect("x64 target");
        assert_eq!(target.executable, x64);
        assert_eq!(target.launcher, None);
    }

    #[test]
    fn rosetta_probe_is_memoized() {
        let probe = RosettaProbe::new();
        let mut calls = 0;
        assert!(probe.is_installed(|| {
            calls += 1;
            true
        }));
        assert!(probe.is_installed(|| {
            calls += 1;
            false
        }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn custom_target_parses_quoted_command_lines() {
        let target =
            resolve_custom_target("\"/opt/my backend/app\" --port 5000").expect("custom target");
        assert_eq!(target.executable, PathBuf::from("/opt/my backend/app"));
        let (program, args) = target.command_line();
        assert_eq!(program, "/opt/my backend/app");
        assert_eq!(args, vec!["--port".to_string(), "5000".to_string()]);
    }

    #[test]
    fn custom_target_rejects_empty_commands() {
        assert!(matches!(
            resolve_custom_target("   "),
            Err(ShellError::InvalidBackendCommand(_))
        ));
    }
}
