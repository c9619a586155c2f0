//! The wallet store: one named container, opened into memory, edited, and
//! written back whole on close.
//!
//! A `WalletStore` is not synchronized. Callers that share one across
//! threads wrap it in [`crate::shared::SharedWalletStore`]. Nothing guards
//! against two processes opening the same container; that exclusion belongs
//! to whoever hosts the store.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::config_store::{BackendConfig, BackupConfig};
use crate::crypto::{OsRandom, RandomSource};
use crate::errors::{WalletError, WalletResult};
use crate::model::{Entry, FolderMap, RenameConflict};
use crate::storage::{read_container, write_container, WalletPaths};
use crate::validation::validate_wallet_name;

/// How a successful [`WalletStore::open`] found the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// No container existed; an empty wallet was created.
    Created,
    /// An existing container was decrypted and loaded.
    Opened,
}

pub struct WalletStore {
    name: String,
    paths: WalletPaths,
    backups: BackupConfig,
    random: Box<dyn RandomSource + Send>,
    /// Present exactly while the wallet is open.
    folders: Option<FolderMap>,
}

impl WalletStore {
    pub fn new(name: impl Into<String>, paths: WalletPaths) -> WalletResult<Self> {
        Self::with_config(name, paths, &BackendConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        paths: WalletPaths,
        config: &BackendConfig,
    ) -> WalletResult<Self> {
        let name = name.into();
        validate_wallet_name(&name)?;
        Ok(Self {
            name,
            paths,
            backups: config.backups.clone(),
            random: Box::new(OsRandom),
            folders: None,
        })
    }

    /// Replace the random source used for container headers and padding.
    pub fn with_random_source(mut self, random: Box<dyn RandomSource + Send>) -> Self {
        self.random = random;
        self
    }

    /// Whether a container for `name` exists in the save location. Nothing
    /// is decrypted.
    pub fn exists(paths: &WalletPaths, name: &str) -> bool {
        paths.wallet_file(name).exists()
    }

    pub fn wallet_name(&self) -> &str {
        &self.name
    }

    pub fn container_path(&self) -> PathBuf {
        self.paths.wallet_file(&self.name)
    }

    pub fn is_open(&self) -> bool {
        self.folders.is_some()
    }

    /// Point a closed store at another wallet.
    pub fn change_wallet(&mut self, name: impl Into<String>) -> WalletResult<()> {
        if self.is_open() {
            return Err(WalletError::AlreadyOpen);
        }
        let name = name.into();
        validate_wallet_name(&name)?;
        self.name = name;
        Ok(())
    }

    /// Decrypt the container into memory, creating an empty wallet when
    /// none exists yet. Any format or integrity failure leaves the store
    /// closed.
    ///
    /// The key is derived from the UTF-8 bytes of `passphrase`. A container
    /// written with a passphrase in a legacy 8-bit encoding only opens here
    /// if those bytes happen to be valid UTF-8; otherwise go through
    /// [`crate::storage::read_container`] with the raw bytes.
    pub fn open(&mut self, passphrase: &SecretString) -> WalletResult<OpenOutcome> {
        if self.is_open() {
            return Err(WalletError::AlreadyOpen);
        }

        let path = self.container_path();
        debug!("Opening wallet '{}' from {}", self.name, path.display());
        match read_container(&path, passphrase.expose_secret().as_bytes())? {
            Some(folders) => {
                debug!(
                    "Loaded wallet '{}' with {} folder(s)",
                    self.name,
                    folders.folder_names().len()
                );
                self.folders = Some(folders);
                Ok(OpenOutcome::Opened)
            }
            None => {
                if !path.exists() {
                    self.paths.ensure_directories()?;
                    File::create(&path)?;
                }
                info!("Created new wallet '{}'", self.name);
                self.folders = Some(FolderMap::new());
                Ok(OpenOutcome::Created)
            }
        }
    }

    /// Encrypt the in-memory wallet back to disk and drop it from memory.
    /// On failure the store stays open with its contents intact.
    ///
    /// The container is keyed on the UTF-8 bytes of `passphrase`.
    pub fn close(&mut self, passphrase: &SecretString) -> WalletResult<()> {
        let folders = self.folders.as_ref().ok_or(WalletError::NotOpen)?;
        let path = self.container_path();

        let snapshot = self.backups.enabled && has_content(&path);
        if snapshot {
            let backup = self.paths.create_backup(&self.name)?;
            debug!("Backed up wallet '{}' to {}", self.name, backup.display());
        }

        write_container(
            &path,
            passphrase.expose_secret().as_bytes(),
            folders,
            self.random.as_mut(),
        )?;
        self.folders = None;
        info!("Saved wallet '{}'", self.name);

        if snapshot {
            if let Err(err) = self.paths.prune_backups(&self.name, self.backups.keep) {
                warn!("Failed to prune backups of wallet '{}': {err}", self.name);
            }
        }
        Ok(())
    }

    /// Close without saving. Unsaved changes are wiped from memory.
    pub fn discard(&mut self) -> WalletResult<()> {
        if self.folders.take().is_none() {
            return Err(WalletError::NotOpen);
        }
        debug!("Discarded in-memory changes to wallet '{}'", self.name);
        Ok(())
    }

    /// Re-encrypt the container under a new passphrase. The store must be
    /// closed and is closed again afterwards.
    pub fn change_passphrase(
        &mut self,
        current: &SecretString,
        new: &SecretString,
    ) -> WalletResult<()> {
        self.open(current)?;
        if let Err(err) = self.close(new) {
            // The container on disk still holds the old contents.
            self.folders = None;
            return Err(err);
        }
        Ok(())
    }

    pub fn list_backups(&self) -> WalletResult<Vec<PathBuf>> {
        self.paths.list_backups(&self.name)
    }

    /// Replace the container with one of its backups. Only while closed.
    pub fn restore_backup(&self, backup_path: impl AsRef<Path>) -> WalletResult<()> {
        if self.is_open() {
            return Err(WalletError::AlreadyOpen);
        }
        self.paths.restore_backup(&self.name, backup_path)
    }

    pub fn folder_list(&self) -> WalletResult<Vec<String>> {
        Ok(self.model()?.folder_names())
    }

    pub fn has_folder(&self, folder: &str) -> WalletResult<bool> {
        Ok(self.model()?.has_folder(folder))
    }

    /// Returns false when the folder already exists.
    pub fn create_folder(&mut self, folder: &str) -> WalletResult<bool> {
        Ok(self.model_mut()?.create_folder(folder))
    }

    /// Remove a folder and all of its entries. Returns false when absent.
    pub fn remove_folder(&mut self, folder: &str) -> WalletResult<bool> {
        Ok(self.model_mut()?.remove_folder(folder))
    }

    /// Keys in `folder`; empty when the folder does not exist.
    pub fn entry_list(&self, folder: &str) -> WalletResult<Vec<String>> {
        Ok(self.model()?.entry_keys(folder))
    }

    pub fn has_entry(&self, folder: &str, key: &str) -> WalletResult<bool> {
        Ok(self.model()?.has_entry(folder, key))
    }

    pub fn read_entry(&self, folder: &str, key: &str) -> WalletResult<Option<&Entry>> {
        Ok(self.model()?.read_entry(folder, key))
    }

    /// Store `entry` under its key, replacing any previous value and type.
    pub fn write_entry(&mut self, folder: &str, entry: Entry) -> WalletResult<()> {
        self.model_mut()?.write_entry(folder, entry);
        Ok(())
    }

    pub fn remove_entry(&mut self, folder: &str, key: &str) -> WalletResult<bool> {
        Ok(self.model_mut()?.remove_entry(folder, key))
    }

    pub fn rename_entry(&mut self, folder: &str, old_key: &str, new_key: &str) -> WalletResult<()> {
        self.model_mut()?
            .rename_entry(folder, old_key, new_key)
            .map_err(|conflict| match conflict {
                RenameConflict::FolderMissing => WalletError::FolderNotFound(folder.to_string()),
                RenameConflict::SourceMissing => WalletError::EntryNotFound(old_key.to_string()),
                RenameConflict::TargetExists => WalletError::EntryExists(new_key.to_string()),
            })
    }

    fn model(&self) -> WalletResult<&FolderMap> {
        self.folders.as_ref().ok_or(WalletError::NotOpen)
    }

    fn model_mut(&mut self) -> WalletResult<&mut FolderMap> {
        self.folders.as_mut().ok_or(WalletError::NotOpen)
    }
}

impl std::fmt::Debug for WalletStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletStore")
            .field("name", &self.name)
            .field("root", &self.paths.root_dir())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for WalletStore {
    fn drop(&mut self) {
        if self.folders.is_some() {
            debug!("Wallet '{}' dropped while open; changes discarded", self.name);
        }
    }
}

fn has_content(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => metadata.len() > 0,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            warn!("Cannot inspect {} before saving, skipping backup: {err}", path.display());
            false
        }
    }
}
