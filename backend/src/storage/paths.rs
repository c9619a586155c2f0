use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::errors::{WalletError, WalletResult};

/// Environment variable naming the wallet save location.
pub const SAVE_LOCATION_ENV: &str = "KWALLET_SAVE_LOCATION";

/// Manages filesystem paths inside the wallet save location.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    /// Directory holding every `<name>.kwl` container.
    root_dir: PathBuf,
    /// Directory for timestamped container backups.
    backup_dir: PathBuf,
    /// Path to persisted backend configuration.
    config_file: PathBuf,
}

impl WalletPaths {
    /// Extension of wallet containers.
    pub const WALLET_EXTENSION: &'static str = "kwl";
    /// Extension appended to timestamped backups.
    pub const BACKUP_EXTENSION: &'static str = "kwl.bak";

    /// Create a path manager rooted at the save location.
    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::Config(
                "Wallet save location cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            backup_dir: root_dir.join("backups"),
            config_file: root_dir.join("backend.config"),
            root_dir,
        })
    }

    /// Save location taken from `KWALLET_SAVE_LOCATION`.
    pub fn from_env() -> WalletResult<Self> {
        let root = std::env::var_os(SAVE_LOCATION_ENV).ok_or_else(|| {
            WalletError::Config(format!("{SAVE_LOCATION_ENV} is not set"))
        })?;
        Self::new(PathBuf::from(root))
    }

    /// Ensure the directory structure exists, creating missing folders.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        fs::create_dir_all(&self.backup_dir)?;
        Ok(())
    }

    /// Container path for the wallet called `name`.
    pub fn wallet_file(&self, name: &str) -> PathBuf {
        self.root_dir
            .join(format!("{name}.{}", Self::WALLET_EXTENSION))
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Copy the current container of `name` to a timestamped backup.
    pub fn create_backup(&self, name: &str) -> WalletResult<PathBuf> {
        let wallet_file = self.wallet_file(name);
        if !wallet_file.exists() {
            return Err(WalletError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no container for wallet '{name}' to back up"),
            )));
        }

        fs::create_dir_all(&self.backup_dir)?;
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let backup_filename = format!("{name}_{timestamp}.{}", Self::BACKUP_EXTENSION);
        let backup_path = self.backup_dir.join(backup_filename);

        fs::copy(&wallet_file, &backup_path)?;

        let original_size = fs::metadata(&wallet_file)?.len();
        let backup_size = fs::metadata(&backup_path)?.len();
        if original_size != backup_size {
            fs::remove_file(&backup_path)?;
            return Err(WalletError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "backup verification failed: size mismatch",
            )));
        }

        Ok(backup_path)
    }

    /// Replace the container of `name` with `backup_path`.
    /// The current container is kept aside until the copy succeeds.
    pub fn restore_backup(&self, name: &str, backup_path: impl AsRef<Path>) -> WalletResult<()> {
        let backup_path = backup_path.as_ref();
        if !backup_path.exists() {
            return Err(WalletError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("backup file does not exist: {}", backup_path.display()),
            )));
        }

        let wallet_file = self.wallet_file(name);
        let temp_backup = if wallet_file.exists() {
            fs::create_dir_all(&self.backup_dir)?;
            let temp_name = format!("{name}_pre_restore_{}.tmp", Utc::now().timestamp());
            let temp_path = self.backup_dir.join(temp_name);
            fs::copy(&wallet_file, &temp_path)?;
            Some(temp_path)
        } else {
            None
        };

        match fs::copy(backup_path, &wallet_file) {
            Ok(_) => {
                if let Some(temp_path) = temp_backup {
                    let _ = fs::remove_file(temp_path);
                }
                Ok(())
            }
            Err(err) => {
                if let Some(temp_path) = temp_backup {
                    let _ = fs::copy(&temp_path, &wallet_file);
                    let _ = fs::remove_file(temp_path);
                }
                Err(err.into())
            }
        }
    }

    /// Backups of `name`, newest first.
    pub fn list_backups(&self, name: &str) -> WalletResult<Vec<PathBuf>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{name}_");
        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
                continue;
            };
            let stamp = filename
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_suffix(Self::BACKUP_EXTENSION))
                .and_then(|rest| rest.strip_suffix('.'));
            if stamp.is_some_and(is_timestamp) {
                backups.push(path);
            }
        }

        // Timestamps are fixed width, so name order is age order.
        backups.sort();
        backups.reverse();
        Ok(backups)
    }

    /// Delete old backups of `name`, keeping the `keep_count` newest.
    pub fn prune_backups(&self, name: &str, keep_count: usize) -> WalletResult<usize> {
        let backups = self.list_backups(name)?;
        let mut deleted_count = 0;

        for backup_path in backups.iter().skip(keep_count) {
            fs::remove_file(backup_path)?;
            deleted_count += 1;
        }

        Ok(deleted_count)
    }
}

/// Matches `%Y%m%d_%H%M%S_%6f`, so "a_b" backups are not listed under "a".
fn is_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 22
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 15 => *b == b'_',
            _ => b.is_ascii_digit(),
        })
}
