//! Cipher, digest and randomness primitives used by the wallet container.
//!
//! The container format is fixed to Blowfish (8-byte blocks, 448-bit key)
//! and SHA-1. The cipher and the random source sit behind small traits so
//! the codec never touches a concrete primitive directly.

use blowfish::cipher::generic_array::GenericArray;
use blowfish::cipher::{BlockDecrypt, BlockEncrypt, InvalidLength, KeyInit};
use blowfish::Blowfish;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::errors::{WalletError, WalletResult};

/// Blowfish block size in bytes.
pub const BLOCK_SIZE: usize = 8;
/// SHA-1 output size in bytes.
pub const DIGEST_LEN: usize = 20;

/// A block cipher that transforms whole buffers in place.
pub trait BlockCipher {
    fn block_size(&self) -> usize;

    /// Encrypt `buffer` in place. `buffer.len()` must be a multiple of the
    /// block size.
    fn encrypt_in_place(&self, buffer: &mut [u8]) -> WalletResult<()>;

    /// Decrypt `buffer` in place. `buffer.len()` must be a multiple of the
    /// block size.
    fn decrypt_in_place(&self, buffer: &mut [u8]) -> WalletResult<()>;
}

/// Source of random bytes for the container header and padding.
pub trait RandomSource {
    fn fill(&mut self, buffer: &mut [u8]) -> WalletResult<()>;
}

/// Random bytes from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, buffer: &mut [u8]) -> WalletResult<()> {
        OsRng
            .try_fill_bytes(buffer)
            .map_err(|e| WalletError::RandomSource(e.to_string()))
    }
}

/// Blowfish applied block by block over the buffer.
pub struct BlowfishCipher {
    inner: Blowfish,
}

impl BlowfishCipher {
    /// Blowfish accepts keys of 4 to 56 bytes.
    pub fn new(key: &[u8]) -> Result<Self, InvalidLength> {
        let inner: Blowfish = Blowfish::new_from_slice(key)?;
        Ok(Self { inner })
    }
}

impl std::fmt::Debug for BlowfishCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlowfishCipher").finish_non_exhaustive()
    }
}

impl BlockCipher for BlowfishCipher {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn encrypt_in_place(&self, buffer: &mut [u8]) -> WalletResult<()> {
        if buffer.len() % BLOCK_SIZE != 0 {
            return Err(WalletError::Encrypt(format!(
                "buffer length {} is not a multiple of {BLOCK_SIZE}",
                buffer.len()
            )));
        }
        for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
            self.inner
                .encrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }

    fn decrypt_in_place(&self, buffer: &mut [u8]) -> WalletResult<()> {
        if buffer.len() % BLOCK_SIZE != 0 {
            return Err(WalletError::Decrypt(format!(
                "buffer length {} is not a multiple of {BLOCK_SIZE}",
                buffer.len()
            )));
        }
        for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
            self.inner
                .decrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
}

/// SHA-1 of `data`.
pub fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut output = [0u8; DIGEST_LEN];
    output.copy_from_slice(&Sha1::digest(data));
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wiped_on_drop<T: zeroize::ZeroizeOnDrop>() {}

    #[test]
    fn expanded_key_schedule_is_wiped_on_drop() {
        wiped_on_drop::<Blowfish>();
    }

    #[test]
    fn sha1_matches_reference_vector() {
        assert_eq!(
            hex::encode(digest(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex::encode(digest(b"")),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn blowfish_matches_reference_vector() {
        // Eric Young's test set: all-zero key and block.
        let cipher = BlowfishCipher::new(&[0u8; 8]).unwrap();
        let mut block = [0u8; 8];
        cipher.encrypt_in_place(&mut block).unwrap();
        assert_eq!(hex::encode(block), "4ef997456198dd78");
    }

    #[test]
    fn blowfish_round_trip_over_many_blocks() {
        let cipher = BlowfishCipher::new(&[7u8; 56]).unwrap();
        let original: Vec<u8> = (0..64u8).collect();
        let mut buffer = original.clone();

        cipher.encrypt_in_place(&mut buffer).unwrap();
        assert_ne!(buffer, original);
        assert_ne!(buffer[0..8], buffer[8..16]);

        cipher.decrypt_in_place(&mut buffer).unwrap();
        assert_eq!(buffer, original);
    }

    #[test]
    fn unaligned_buffers_are_rejected() {
        let cipher = BlowfishCipher::new(&[1u8; 56]).unwrap();
        let mut buffer = [0u8; 9];
        assert!(matches!(
            cipher.encrypt_in_place(&mut buffer),
            Err(WalletError::Encrypt(_))
        ));
        assert!(matches!(
            cipher.decrypt_in_place(&mut buffer),
            Err(WalletError::Decrypt(_))
        ));
    }

    #[test]
    fn oversized_key_is_rejected() {
        assert!(BlowfishCipher::new(&[0u8; 57]).is_err());
    }

    #[test]
    fn os_random_fills_buffer() {
        let mut buffer = [0u8; 64];
        OsRandom.fill(&mut buffer).unwrap();
        assert!(buffer.iter().any(|&b| b != 0));
    }
}
