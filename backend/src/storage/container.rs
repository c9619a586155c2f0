//! On-disk `.kwl` container.
//!
//! ```text
//! [0..12)    magic "KWALLET\n\r\0\r\n"
//! [12..14)   version major, minor (0, 0)
//! [14..EOF)  Blowfish-encrypted region, a whole number of 8-byte blocks
//! ```
//!
//! Decrypted region:
//!
//! ```text
//! [0..8)          random block, ignored
//! [8..12)         payload length N, u32 BE
//! [12..12+N)      serialized folder map
//! [12+N..len-20)  random padding, 1..=8 bytes
//! [len-20..len)   SHA-1 of the payload
//! ```
//!
//! Every write replaces the whole file.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use zeroize::Zeroizing;

use super::payload;
use crate::crypto::{digest, BlockCipher, BlowfishCipher, RandomSource, BLOCK_SIZE, DIGEST_LEN};
use crate::errors::{WalletError, WalletResult};
use crate::kdf::derive_key;
use crate::model::FolderMap;

pub const MAGIC: &[u8; 12] = b"KWALLET\n\r\0\r\n";
pub const VERSION_MAJOR: u8 = 0;
pub const VERSION_MINOR: u8 = 0;

const HEADER_LEN: usize = MAGIC.len() + 2;
const LENGTH_FIELD_LEN: usize = 4;
const MIN_REGION_LEN: usize = BLOCK_SIZE + LENGTH_FIELD_LEN + DIGEST_LEN;

/// Read the container at `path`.
///
/// Returns `Ok(None)` when there is nothing to decrypt yet: the file does
/// not exist or is empty.
pub fn read_container(path: &Path, passphrase: &[u8]) -> WalletResult<Option<FolderMap>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if bytes.is_empty() {
        debug!("Container {} is empty", path.display());
        return Ok(None);
    }

    open_container(&bytes, passphrase).map(Some)
}

/// Validate, decrypt and parse a complete container image.
pub fn open_container(bytes: &[u8], passphrase: &[u8]) -> WalletResult<FolderMap> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(WalletError::BadMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(WalletError::CorruptStructure(
            "missing version bytes".to_string(),
        ));
    }
    let (major, minor) = (bytes[MAGIC.len()], bytes[MAGIC.len() + 1]);
    if major != VERSION_MAJOR || minor != VERSION_MINOR {
        return Err(WalletError::UnknownVersion { major, minor });
    }

    let region_len = bytes.len() - HEADER_LEN;
    if region_len % BLOCK_SIZE != 0 {
        return Err(WalletError::CorruptStructure(format!(
            "encrypted region of {region_len} bytes is not a multiple of {BLOCK_SIZE}"
        )));
    }
    if region_len < MIN_REGION_LEN {
        return Err(WalletError::CorruptStructure(format!(
            "encrypted region of {region_len} bytes is too short"
        )));
    }

    let mut plain = Zeroizing::new(bytes[HEADER_LEN..].to_vec());
    {
        let key = derive_key(passphrase);
        let cipher = BlowfishCipher::new(key.as_slice())
            .map_err(|e| WalletError::Decrypt(e.to_string()))?;
        cipher.decrypt_in_place(&mut plain)?;
    }

    let mut length = [0u8; LENGTH_FIELD_LEN];
    length.copy_from_slice(&plain[BLOCK_SIZE..BLOCK_SIZE + LENGTH_FIELD_LEN]);
    let payload_len = u32::from_be_bytes(length) as usize;

    let payload_start = BLOCK_SIZE + LENGTH_FIELD_LEN;
    let hash_start = plain.len() - DIGEST_LEN;
    // Without a password verifier a wrong key and a damaged file decrypt to
    // the same kind of garbage, so an impossible length is an integrity
    // failure rather than a structural one.
    if payload_len > hash_start - payload_start {
        warn!("Container length field out of range: wrong passphrase or corrupted file");
        return Err(WalletError::Integrity);
    }

    let payload = &plain[payload_start..payload_start + payload_len];
    if digest(payload) != plain[hash_start..] {
        warn!("Container digest mismatch: wrong passphrase or corrupted file");
        return Err(WalletError::Integrity);
    }

    payload::decode(payload)
}

/// Serialize, pad and encrypt `folders` into a complete container image.
pub fn seal_container(
    folders: &FolderMap,
    passphrase: &[u8],
    random: &mut dyn RandomSource,
) -> WalletResult<Vec<u8>> {
    let payload = payload::encode(folders)?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        WalletError::CorruptStructure(format!("payload of {} bytes is too large", payload.len()))
    })?;
    let hash = digest(&payload);

    let total = region_len(payload.len());
    let pad = total - MIN_REGION_LEN - payload.len();

    let mut filler = Zeroizing::new(vec![0u8; BLOCK_SIZE + pad]);
    random.fill(&mut filler)?;

    let mut region = Zeroizing::new(Vec::with_capacity(total));
    region.extend_from_slice(&filler[..BLOCK_SIZE]);
    region.extend_from_slice(&payload_len.to_be_bytes());
    region.extend_from_slice(&payload);
    region.extend_from_slice(&filler[BLOCK_SIZE..]);
    region.extend_from_slice(&hash);
    debug_assert_eq!(region.len(), total);

    {
        let key = derive_key(passphrase);
        let cipher = BlowfishCipher::new(key.as_slice())
            .map_err(|e| WalletError::Encrypt(e.to_string()))?;
        cipher.encrypt_in_place(&mut region)?;
    }

    let mut image = Vec::with_capacity(HEADER_LEN + total);
    image.extend_from_slice(MAGIC);
    image.push(VERSION_MAJOR);
    image.push(VERSION_MINOR);
    image.extend_from_slice(&region);
    Ok(image)
}

/// Seal `folders` and atomically replace the container at `path`.
pub fn write_container(
    path: &Path,
    passphrase: &[u8],
    folders: &FolderMap,
    random: &mut dyn RandomSource,
) -> WalletResult<()> {
    let image = seal_container(folders, passphrase, random)?;
    let mut file = create_atomic_file(path)?;
    file.write_all(&image)?;
    file.sync_all()?;
    finalize_atomic_file(file, path)?;
    debug!("Wrote {} byte container to {}", image.len(), path.display());
    Ok(())
}

/// Length of the encrypted region for a payload of `payload_len` bytes.
///
/// At least one padding byte is always added, so an already aligned
/// layout grows by a full block.
pub fn region_len(payload_len: usize) -> usize {
    let raw = MIN_REGION_LEN + payload_len;
    raw + (BLOCK_SIZE - raw % BLOCK_SIZE)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".new");
    PathBuf::from(name)
}

fn create_atomic_file(path: &Path) -> WalletResult<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(File::create(temp_path(path))?)
}

fn finalize_atomic_file(mut file: File, final_path: &Path) -> WalletResult<()> {
    file.flush()?;
    drop(file);
    fs::rename(temp_path(final_path), final_path)?;
    Ok(())
}
