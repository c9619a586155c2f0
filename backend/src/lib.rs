// lib.rs - Encrypted credential wallet storage backend

pub mod config_store;
pub mod crypto;
pub mod errors;
pub mod kdf;
pub mod model;
pub mod shared;
pub mod storage;
pub mod store;
pub mod validation;

// Re-export common types
pub use config_store::{BackendConfig, BackupConfig, ConfigStore};
pub use errors::{WalletError, WalletResult};
pub use model::{Entry, EntryType, Folder, FolderMap};
pub use shared::SharedWalletStore;
pub use storage::WalletPaths;
pub use store::{OpenOutcome, WalletStore};
