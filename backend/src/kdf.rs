//! Passphrase to cipher key derivation.
//!
//! The passphrase bytes are dealt round-robin into three buffers, each
//! buffer is hashed with SHA-1, and slices of the three digests are
//! concatenated into a 448-bit Blowfish key:
//!
//! ```text
//! key[0..19)  = sha1(first)[0..19)
//! key[19..38) = sha1(second)[0..19)
//! key[38..56) = sha1(third)[0..18)
//! ```
//!
//! This scheme is unsalted and cheap to brute force. It is kept only
//! because existing `.kwl` containers are encrypted with it; changing it
//! requires a new format version.

use zeroize::Zeroizing;

use crate::crypto::digest;

/// Derived key length: 448 bits.
pub const KEY_LEN: usize = 56;

const FIRST_LEN: usize = 19;
const SECOND_LEN: usize = 19;
const THIRD_LEN: usize = KEY_LEN - FIRST_LEN - SECOND_LEN;

/// Derive the container key from `passphrase`.
pub fn derive_key(passphrase: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let third_cap = passphrase.len() / 3 + 1;
    let mut parts: [Zeroizing<Vec<u8>>; 3] = [
        Zeroizing::new(Vec::with_capacity(third_cap)),
        Zeroizing::new(Vec::with_capacity(third_cap)),
        Zeroizing::new(Vec::with_capacity(third_cap)),
    ];
    for (i, &byte) in passphrase.iter().enumerate() {
        parts[i % 3].push(byte);
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    let lens = [FIRST_LEN, SECOND_LEN, THIRD_LEN];
    let mut offset = 0;
    for (part, len) in parts.iter().zip(lens) {
        let hash = Zeroizing::new(digest(part));
        key[offset..offset + len].copy_from_slice(&hash[..len]);
        offset += len;
    }
    debug_assert_eq!(offset, KEY_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_assembled_from_three_digests() {
        let key = derive_key(b"abcdef");
        let first = digest(b"ad");
        let second = digest(b"be");
        let third = digest(b"cf");

        assert_eq!(&key[0..19], &first[..19]);
        assert_eq!(&key[19..38], &second[..19]);
        assert_eq!(&key[38..56], &third[..18]);
    }

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(*derive_key(b"hunter2"), *derive_key(b"hunter2"));
        assert_ne!(*derive_key(b"hunter2"), *derive_key(b"hunter3"));
    }

    #[test]
    fn uneven_lengths_distribute_round_robin() {
        // 7 bytes: first gets 3, second 2, third 2.
        let key = derive_key(b"1234567");
        assert_eq!(&key[0..19], &digest(b"147")[..19]);
        assert_eq!(&key[19..38], &digest(b"25")[..19]);
        assert_eq!(&key[38..56], &digest(b"36")[..18]);
    }

    #[test]
    fn short_passphrases_hash_empty_parts() {
        let key = derive_key(b"a");
        let empty = digest(b"");
        assert_eq!(&key[0..19], &digest(b"a")[..19]);
        assert_eq!(&key[19..38], &empty[..19]);
        assert_eq!(&key[38..56], &empty[..18]);
    }

    #[test]
    fn reordering_bytes_changes_the_key() {
        assert_ne!(*derive_key(b"abcabc"), *derive_key(b"aabbcc"));
    }
}
