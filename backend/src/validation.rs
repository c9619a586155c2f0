use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{WalletError, WalletResult};

pub const MAX_WALLET_NAME_LEN: usize = 128;

// Names become file names inside the save location, so separators and
// leading dots are excluded.
static WALLET_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9 _@+\-][A-Za-z0-9 _.@+\-]*$").expect("wallet name pattern compiles")
});

/// Validate a wallet name before it is mapped to `<name>.kwl`.
pub fn validate_wallet_name(name: &str) -> WalletResult<()> {
    if name.is_empty() {
        return Err(WalletError::InvalidWalletName(
            "Wallet name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > MAX_WALLET_NAME_LEN {
        return Err(WalletError::InvalidWalletName(format!(
            "Wallet name longer than {MAX_WALLET_NAME_LEN} characters"
        )));
    }

    if !WALLET_NAME_PATTERN.is_match(name) {
        return Err(WalletError::InvalidWalletName(format!(
            "Wallet name '{name}' contains unsupported characters"
        )));
    }

    Ok(())
}
