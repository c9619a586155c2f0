use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    // State machine misuse
    #[error("Wallet is already open")]
    AlreadyOpen,
    #[error("Wallet is not open")]
    NotOpen,

    // Storage errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Container format errors
    #[error("Not a wallet file: bad magic")]
    BadMagic,
    #[error("Unknown wallet format version {major}.{minor}")]
    UnknownVersion { major: u8, minor: u8 },
    #[error("Corrupt wallet structure: {0}")]
    CorruptStructure(String),
    #[error("Wallet integrity verification failed")]
    Integrity,

    // Cryptographic errors
    #[error("Decryption failed: {0}")]
    Decrypt(String),
    #[error("Encryption failed: {0}")]
    Encrypt(String),
    #[error("Random source failure: {0}")]
    RandomSource(String),

    // Logical errors on folders and entries
    #[error("Folder not found: {0}")]
    FolderNotFound(String),
    #[error("Entry not found: {0}")]
    EntryNotFound(String),
    #[error("Entry already exists: {0}")]
    EntryExists(String),

    // Validation and configuration
    #[error("Invalid wallet name: {0}")]
    InvalidWalletName(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WalletError {
    /// True for errors that indicate an unreadable container rather than a
    /// caller mistake. A wrong passphrase shows up here as `Integrity` or
    /// `Decrypt`, since the format stores no password verifier.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            WalletError::BadMagic
                | WalletError::UnknownVersion { .. }
                | WalletError::CorruptStructure(_)
                | WalletError::Integrity
                | WalletError::Decrypt(_)
        )
    }
}

pub type WalletResult<T> = Result<T, WalletError>;
