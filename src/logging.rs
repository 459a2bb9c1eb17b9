use std::{
    env,
    ffi::OsString,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};

use crate::{SHELL_LOG_BACKUP_COUNT, SHELL_LOG_FILE, SHELL_LOG_MAX_BYTES, SHELL_LOG_PATH_ENV};

static SHELL_LOG_WRITE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellLogCategory {
    Startup,
    Runtime,
    Shutdown,
}

impl ShellLogCategory {
    fn as_label(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Runtime => "runtime",
            Self::Shutdown => "shutdown",
        }
    }
}

fn rotated_log_path(path: &Path, index: usize) -> PathBuf {
    let mut value = OsString::from(path.as_os_str());
    value.push(format!(".{index}"));
    PathBuf::from(value)
}

fn remove_backup_if_exists(path: &Path) {
    if let Err(error) = fs::remove_file(path) {
        if error.kind() != std::io::ErrorKind::NotFound {
            eprintln!(
                "[shell log] failed to remove backup {}: {}",
                path.display(),
                error
            );
        }
    }
}

/// Size-gated rotation: `shell.log` -> `shell.log.1` -> .. -> `shell.log.N`,
/// oldest dropped. Rotation failures go to stderr and are otherwise ignored.
pub fn rotate_log_if_needed(path: &Path, max_bytes: u64, backup_count: usize) {
    if max_bytes == 0 || backup_count == 0 {
        return;
    }
    match fs::metadata(path) {
        Ok(metadata) if metadata.len() >= max_bytes => {}
        _ => return,
    }

    remove_backup_if_exists(&rotated_log_path(path, backup_count));
    for index in (1..backup_count).rev() {
        let source = rotated_log_path(path, index);
        if !source.exists() {
            continue;
        }
        let target = rotated_log_path(path, index + 1);
        remove_backup_if_exists(&target);
        if let Err(error) = fs::rename(&source, &target) {
            eprintln!(
                "[shell log] failed to rename {} to {}: {}",
                source.display(),
                target.display(),
                error
            );
        }
    }

    let first_backup = rotated_log_path(path, 1);
    remove_backup_if_exists(&first_backup);
    if let Err(error) = fs::rename(path, &first_backup) {
        eprintln!(
            "[shell log] failed to rotate {} to {}: {}",
            path.display(),
            first_backup.display(),
            error
        );
    }
}

pub fn resolve_shell_log_path() -> PathBuf {
    if let Ok(custom) = env::var(SHELL_LOG_PATH_ENV) {
        let candidate = PathBuf::from(custom.trim());
        if !candidate.as_os_str().is_empty() {
            return candidate;
        }
    }

    if let Some(home_dir) = home::home_dir() {
        return home_dir
            .join(".config")
            .join("goodreads-rpc")
            .join("logs")
            .join(SHELL_LOG_FILE);
    }

    env::temp_dir()
        .join("goodreads-rpc")
        .join("logs")
        .join(SHELL_LOG_FILE)
}

pub fn append_shell_log(category: ShellLogCategory, message: &str) {
    append_shell_log_to(
        &resolve_shell_log_path(),
        category,
        message,
        SHELL_LOG_MAX_BYTES,
        SHELL_LOG_BACKUP_COUNT,
    );
}

fn append_shell_log_to(
    path: &Path,
    category: ShellLogCategory,
    message: &str,
    max_bytes: u64,
    backup_count: usize,
) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _guard = match SHELL_LOG_WRITE_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    rotate_log_if_needed(path, max_bytes, backup_count);
    let timestamp = chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.3f %z")
        .to_string();
    let line = format!("[{}] [{}] {}\n", timestamp, category.as_label(), message);
    let _ = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.as_bytes()));
}

pub fn append_startup_log(message: &str) {
    append_shell_log(ShellLogCategory::Startup, message);
}

pub fn append_runtime_log(message: &str) {
    append_shell_log(ShellLogCategory::Runtime, message);
}

pub fn append_shutdown_log(message: &str) {
    append_shell_log(ShellLogCategory::Shutdown, message);
}
