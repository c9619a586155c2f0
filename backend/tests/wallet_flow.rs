use std::fs;

use kwallet_backend::crypto::BLOCK_SIZE;
use kwallet_backend::{
    Entry, EntryType, OpenOutcome, WalletError, WalletPaths, WalletResult, WalletStore,
};
use secrecy::SecretString;
use tempfile::TempDir;

const HEADER_LEN: usize = 14;

fn secret(passphrase: &str) -> SecretString {
    SecretString::from(passphrase.to_string())
}

#[test]
fn wallet_create_close_reopen_flow() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let paths = WalletPaths::new(temp_dir.path())?;
    assert!(!WalletStore::exists(&paths, "test"));

    let mut wallet = WalletStore::new("test", paths.clone())?;
    assert_eq!(wallet.open(&secret("hunter2"))?, OpenOutcome::Created);
    assert!(WalletStore::exists(&paths, "test"));

    assert!(wallet.create_folder("Passwords")?);
    wallet.write_entry("Passwords", Entry::password("site1", "secret123"))?;
    wallet.close(&secret("hunter2"))?;
    assert!(!wallet.is_open());

    assert_eq!(wallet.open(&secret("hunter2"))?, OpenOutcome::Opened);
    let entry = wallet
        .read_entry("Passwords", "site1")?
        .expect("entry survives reopen");
    assert_eq!(entry.entry_type(), EntryType::Password);
    assert_eq!(entry.value(), b"secret123");
    wallet.discard()?;

    let err = wallet
        .open(&secret("wrong"))
        .expect_err("expected open failure");
    assert!(matches!(
        err,
        WalletError::Integrity | WalletError::Decrypt(_)
    ));
    assert!(!wallet.is_open());
    Ok(())
}

#[test]
fn many_folders_and_entries_round_trip() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut wallet = WalletStore::new("bulk", WalletPaths::new(temp_dir.path())?)?;
    wallet.open(&secret("correct horse battery staple"))?;

    wallet.create_folder("Empty")?;
    for f in 0..10 {
        let folder = format!("folder-{f}");
        for e in 0..25 {
            let value: Vec<u8> = (0..(f * e) as u32).map(|b| b as u8).collect();
            let entry = match e % 3 {
                0 => Entry::password(format!("key-{e}"), format!("pw-{f}-{e}")),
                1 => Entry::stream(format!("key-{e}"), value),
                _ => Entry::map(format!("key-{e}"), value),
            };
            wallet.write_entry(&folder, entry)?;
        }
    }
    let folders_before = wallet.folder_list()?;
    wallet.close(&secret("correct horse battery staple"))?;

    wallet.open(&secret("correct horse battery staple"))?;
    assert_eq!(wallet.folder_list()?, folders_before);
    assert!(wallet.entry_list("Empty")?.is_empty());
    for f in 0..10 {
        let folder = format!("folder-{f}");
        assert_eq!(wallet.entry_list(&folder)?.len(), 25);
        let entry = wallet.read_entry(&folder, "key-7")?.expect("present");
        assert_eq!(entry.entry_type(), EntryType::Stream);
        assert_eq!(entry.value().len(), f * 7);
        assert_eq!(
            wallet
                .read_entry(&folder, "key-3")?
                .and_then(|e| e.password_text().map(str::to_owned)),
            Some(format!("pw-{f}-3"))
        );
    }
    Ok(())
}

#[test]
fn uniqueness_and_cascade_rules_hold() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut wallet = WalletStore::new("rules", WalletPaths::new(temp_dir.path())?)?;
    wallet.open(&secret("pw"))?;

    wallet.write_entry("F", Entry::password("k", "one"))?;
    assert!(!wallet.create_folder("F")?);
    assert!(wallet.has_entry("F", "k")?);

    wallet.write_entry("F", Entry::stream("k", b"two".to_vec()))?;
    assert_eq!(wallet.entry_list("F")?, vec!["k"]);
    let entry = wallet.read_entry("F", "k")?.expect("present");
    assert_eq!(entry.entry_type(), EntryType::Stream);
    assert_eq!(entry.value(), b"two");

    wallet.write_entry("F", Entry::password("other", "x"))?;
    assert!(wallet.rename_entry("F", "k", "other").is_err());
    assert_eq!(wallet.read_entry("F", "k")?.expect("kept").value(), b"two");

    assert!(wallet.remove_folder("F")?);
    assert!(!wallet.has_entry("F", "k")?);
    assert!(!wallet.has_entry("F", "other")?);
    assert!(wallet.read_entry("F", "k")?.is_none());
    assert!(!wallet.remove_folder("F")?);
    assert!(!wallet.remove_entry("F", "k")?);
    Ok(())
}

#[test]
fn tampered_container_fails_integrity() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut wallet = WalletStore::new("tamper", WalletPaths::new(temp_dir.path())?)?;
    wallet.open(&secret("pw"))?;
    wallet.write_entry("F", Entry::stream("k", vec![0x42; 128]))?;
    wallet.close(&secret("pw"))?;

    let path = wallet.container_path();
    let original = fs::read(&path)?;
    // Blocks 2..=15 of the encrypted region hold payload bytes only.
    for block in [2, 8, 15] {
        let mut bytes = original.clone();
        bytes[HEADER_LEN + block * BLOCK_SIZE + 1] ^= 0x80;
        fs::write(&path, &bytes)?;
        assert!(matches!(
            wallet.open(&secret("pw")),
            Err(WalletError::Integrity)
        ));
    }

    fs::write(&path, &original)?;
    wallet.open(&secret("pw"))?;
    Ok(())
}

#[test]
fn foreign_files_are_rejected() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let paths = WalletPaths::new(temp_dir.path())?;
    let mut wallet = WalletStore::new("foreign", paths.clone())?;

    fs::write(paths.wallet_file("foreign"), b"definitely not a wallet file")?;
    assert!(matches!(
        wallet.open(&secret("pw")),
        Err(WalletError::BadMagic)
    ));

    let mut future = b"KWALLET\n\r\0\r\n".to_vec();
    future.extend_from_slice(&[1, 0]);
    future.extend_from_slice(&[0u8; 32]);
    fs::write(paths.wallet_file("foreign"), &future)?;
    assert!(matches!(
        wallet.open(&secret("pw")),
        Err(WalletError::UnknownVersion { major: 1, minor: 0 })
    ));
    assert!(!wallet.is_open());
    Ok(())
}

#[test]
fn encrypted_region_is_block_aligned() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut wallet = WalletStore::new("aligned", WalletPaths::new(temp_dir.path())?)?;
    for len in [0, 1, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1] {
        wallet.open(&secret("pw"))?;
        wallet.write_entry("F", Entry::stream("k", vec![7u8; len]))?;
        wallet.close(&secret("pw"))?;
        let size = fs::metadata(wallet.container_path())?.len() as usize;
        assert_eq!((size - HEADER_LEN) % BLOCK_SIZE, 0, "value length {len}");
    }
    Ok(())
}
