//! Serialized folder map carried inside the encrypted container.
//!
//! ```text
//! repeated per folder:
//!   folder_name : u32 BE length + UTF-8 bytes
//!   entry_count : u32 BE
//!   repeated entry_count times:
//!     key       : u32 BE length + UTF-8 bytes
//!     type      : i32 BE (0 = Password, 1 = Stream, 2 = Map)
//!     value     : u32 BE length + bytes
//! ```

use log::warn;
use zeroize::Zeroizing;

use crate::errors::{WalletError, WalletResult};
use crate::model::{Entry, EntryType, Folder, FolderMap};

/// Width of every length, count and type field.
const FIELD_LEN: usize = 4;

/// Serialize every folder and every entry with a known type.
///
/// The output buffer is sized up front and never grows, so no partial copy
/// of the plaintext is left behind in a freed allocation.
pub fn encode(folders: &FolderMap) -> WalletResult<Zeroizing<Vec<u8>>> {
    let mut plan = Vec::new();
    let mut total = 0usize;
    for (name, entries) in folders.folders() {
        let persisted: Vec<(&Entry, i32)> = entries
            .values()
            .filter_map(|entry| match entry.entry_type().tag() {
                Some(tag) => Some((entry, tag)),
                None => {
                    warn!(
                        "Not persisting entry '{}' in folder '{}': unknown type",
                        entry.key(),
                        name
                    );
                    None
                }
            })
            .collect();

        total += FIELD_LEN + name.len() + FIELD_LEN;
        for (entry, _) in &persisted {
            total += FIELD_LEN + entry.key().len() + FIELD_LEN + FIELD_LEN + entry.value().len();
        }
        plan.push((name, persisted));
    }

    let mut out = Zeroizing::new(Vec::with_capacity(total));
    for (name, persisted) in plan {
        put_bytes(&mut out, name.as_bytes())?;
        put_u32(&mut out, len_u32(persisted.len())?);
        for (entry, tag) in persisted {
            put_bytes(&mut out, entry.key().as_bytes())?;
            out.extend_from_slice(&tag.to_be_bytes());
            put_bytes(&mut out, entry.value())?;
        }
    }
    debug_assert_eq!(out.len(), total);
    Ok(out)
}

/// Parse a payload back into a folder map. Entries with an unknown type tag
/// are skipped.
pub fn decode(data: &[u8]) -> WalletResult<FolderMap> {
    let mut reader = PayloadReader::new(data);
    let mut folders = FolderMap::new();

    while !reader.is_empty() {
        let name = reader.read_string("folder name")?;
        if folders.has_folder(&name) {
            return Err(corrupt(format!("duplicate folder '{name}'")));
        }

        let count = reader.read_u32("entry count")?;
        let mut entries = Folder::new();
        for _ in 0..count {
            let key = reader.read_string("entry key")?;
            let tag = reader.read_i32("entry type")?;
            let value = reader.read_bytes("entry value")?;

            let entry_type = EntryType::from_tag(tag);
            if entry_type == EntryType::Unknown {
                warn!("Skipping entry '{key}' in folder '{name}': unknown type tag {tag}");
                continue;
            }
            if entries.contains_key(&key) {
                return Err(corrupt(format!("duplicate entry '{key}' in '{name}'")));
            }
            entries.insert(key.clone(), Entry::new(key, entry_type, value));
        }
        folders.insert_folder(name, entries);
    }

    Ok(folders)
}

struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize, what: &str) -> WalletResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| corrupt(format!("truncated {what} at offset {}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self, what: &str) -> WalletResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn read_u32(&mut self, what: &str) -> WalletResult<u32> {
        self.read_array(what).map(u32::from_be_bytes)
    }

    fn read_i32(&mut self, what: &str) -> WalletResult<i32> {
        self.read_array(what).map(i32::from_be_bytes)
    }

    fn read_bytes(&mut self, what: &str) -> WalletResult<&'a [u8]> {
        let len = self.read_u32(what)? as usize;
        self.take(len, what)
    }

    fn read_string(&mut self, what: &str) -> WalletResult<String> {
        let bytes = self.read_bytes(what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| corrupt(format!("{what} is not valid UTF-8")))
    }
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> WalletResult<()> {
    put_u32(out, len_u32(bytes.len())?);
    out.extend_from_slice(bytes);
    Ok(())
}

fn len_u32(len: usize) -> WalletResult<u32> {
    u32::try_from(len).map_err(|_| corrupt(format!("field of {len} bytes exceeds u32 length")))
}

fn corrupt(reason: String) -> WalletError {
    WalletError::CorruptStructure(reason)
}
