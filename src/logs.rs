use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use crate::config;

pub const DEBUG_LOG_FILE_NAME: &str = "debug.log";
pub const LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
pub const LOG_BACKUP_COUNT: usize = 3;

const DEFAULT_FILTER: &str = "info,sk_val=debug";

pub fn debug_log_path() -> Result<PathBuf> {
    Ok(config::logs_folder()?.join(DEBUG_LOG_FILE_NAME))
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

/// Shift `debug.log` to `debug.log.1` (and older backups up by one) once it
/// grows past `max_bytes`. The oldest backup is dropped.
pub fn rotate_if_needed(path: &Path, max_bytes: u64, backups: usize) -> Result<bool> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if size <= max_bytes || backups == 0 {
        return Ok(false);
    }

    for index in (1..backups).rev() {
        let from = backup_path(path, index);
        if from.exists() {
            fs::rename(&from, backup_path(path, index + 1))?;
        }
    }
    fs::rename(path, backup_path(path, 1))?;
    Ok(true)
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Initialize file logging. `RUST_LOG` overrides the default filter.
pub fn init() -> Result<PathBuf> {
    let path = debug_log_path()?;
    rotate_if_needed(&path, LOG_FILE_SIZE_BYTES, LOG_BACKUP_COUNT)?;
    let file = open_log_file(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_no_rotation_for_small_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEBUG_LOG_FILE_NAME);
        fs::write(&path, "short").unwrap();

        assert!(!rotate_if_needed(&path, 1024, 3).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_no_rotation_for_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEBUG_LOG_FILE_NAME);
        assert!(!rotate_if_needed(&path, 0, 3).unwrap());
    }

    #[test]
    fn test_rotation_shifts_backups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEBUG_LOG_FILE_NAME);
        fs::write(&path, "current log").unwrap();
        fs::write(backup_path(&path, 1), "older").unwrap();

        assert!(rotate_if_needed(&path, 4, 3).unwrap());

        assert!(!path.exists());
        assert_eq!(fs::read_to_string(backup_path(&path, 1)).unwrap(), "current log");
        assert_eq!(fs::read_to_string(backup_path(&path, 2)).unwrap(), "older");
    }

    #[test]
    fn test_rotation_drops_oldest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEBUG_LOG_FILE_NAME);
        fs::write(&path, "newest").unwrap();
        fs::write(backup_path(&path, 1), "one").unwrap();
        fs::write(backup_path(&path, 2), "two").unwrap();

        rotate_if_needed(&path, 1, 2).unwrap();

        assert_eq!(fs::read_to_string(backup_path(&path, 1)).unwrap(), "newest");
        assert_eq!(fs::read_to_string(backup_path(&path, 2)).unwrap(), "one");
        assert!(!backup_path(&path, 3).exists());
    }

    #[test]
    fn test_open_log_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join(DEBUG_LOG_FILE_NAME);
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
