use std::collections::BTreeMap;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Kind of value stored in an [`Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    Password,
    Stream,
    Map,
    Unknown,
}

impl EntryType {
    /// Tag written to the container. `Unknown` has no tag and is never
    /// persisted.
    pub fn tag(self) -> Option<i32> {
        match self {
            EntryType::Password => Some(0),
            EntryType::Stream => Some(1),
            EntryType::Map => Some(2),
            EntryType::Unknown => None,
        }
    }

    pub fn from_tag(tag: i32) -> Self {
        match tag {
            0 => EntryType::Password,
            1 => EntryType::Stream,
            2 => EntryType::Map,
            _ => EntryType::Unknown,
        }
    }
}

/// A single named secret. The value is wiped when the entry is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Entry {
    key: String,
    #[zeroize(skip)]
    entry_type: EntryType,
    value: Vec<u8>,
}

impl Entry {
    pub fn new(key: impl Into<String>, entry_type: EntryType, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            entry_type,
            value: value.into(),
        }
    }

    pub fn password(key: impl Into<String>, secret: impl AsRef<str>) -> Self {
        Self::new(key, EntryType::Password, secret.as_ref().as_bytes())
    }

    pub fn stream(key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(key, EntryType::Stream, bytes)
    }

    /// A map entry. The serialized map is carried as an opaque blob.
    pub fn map(key: impl Into<String>, serialized: impl Into<Vec<u8>>) -> Self {
        Self::new(key, EntryType::Map, serialized)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Password text, if this is a password entry holding valid UTF-8.
    pub fn password_text(&self) -> Option<&str> {
        match self.entry_type {
            EntryType::Password => std::str::from_utf8(&self.value).ok(),
            _ => None,
        }
    }

    pub(crate) fn set_key(&mut self, key: String) {
        self.key = key;
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("entry_type", &self.entry_type)
            .field("value_len", &self.value.len())
            .finish()
    }
}

/// Entries of one folder, ordered by key.
pub type Folder = BTreeMap<String, Entry>;

/// The whole wallet content: folder name to folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderMap {
    folders: BTreeMap<String, Folder>,
}

impl FolderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn folder_names(&self) -> Vec<String> {
        self.folders.keys().cloned().collect()
    }

    pub fn has_folder(&self, name: &str) -> bool {
        self.folders.contains_key(name)
    }

    pub fn folders(&self) -> impl Iterator<Item = (&String, &Folder)> {
        self.folders.iter()
    }

    /// Returns false if the folder already exists; existing entries are kept.
    pub fn create_folder(&mut self, name: &str) -> bool {
        if self.folders.contains_key(name) {
            return false;
        }
        self.folders.insert(name.to_string(), Folder::new());
        true
    }

    /// Removes the folder and every entry in it.
    pub fn remove_folder(&mut self, name: &str) -> bool {
        self.folders.remove(name).is_some()
    }

    pub fn entry_keys(&self, folder: &str) -> Vec<String> {
        self.folders
            .get(folder)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_entry(&self, folder: &str, key: &str) -> bool {
        self.read_entry(folder, key).is_some()
    }

    pub fn read_entry(&self, folder: &str, key: &str) -> Option<&Entry> {
        self.folders.get(folder).and_then(|entries| entries.get(key))
    }

    /// Inserts or replaces the entry under its own key, creating the folder
    /// when needed.
    pub fn write_entry(&mut self, folder: &str, entry: Entry) {
        self.folders
            .entry(folder.to_string())
            .or_default()
            .insert(entry.key().to_string(), entry);
    }

    pub fn remove_entry(&mut self, folder: &str, key: &str) -> bool {
        self.folders
            .get_mut(folder)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Moves `old_key` to `new_key`. Fails without touching the folder when
    /// the source is missing or the target is taken.
    pub fn rename_entry(
        &mut self,
        folder: &str,
        old_key: &str,
        new_key: &str,
    ) -> Result<(), RenameConflict> {
        let entries = self
            .folders
            .get_mut(folder)
            .ok_or(RenameConflict::FolderMissing)?;
        if !entries.contains_key(old_key) {
            return Err(RenameConflict::SourceMissing);
        }
        if entries.contains_key(new_key) {
            return Err(RenameConflict::TargetExists);
        }
        if let Some(mut entry) = entries.remove(old_key) {
            entry.set_key(new_key.to_string());
            entries.insert(new_key.to_string(), entry);
        }
        Ok(())
    }

    pub(crate) fn insert_folder(&mut self, name: String, folder: Folder) {
        self.folders.insert(name, folder);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameConflict {
    FolderMissing,
    SourceMissing,
    TargetExists,
}
