use std::sync::Arc;

use parking_lot::Mutex;

use crate::config_store::ConfigStore;
use crate::errors::WalletResult;
use crate::storage::WalletPaths;
use crate::store::WalletStore;

/// A `WalletStore` behind a mutex, for callers that reach one wallet from
/// several threads. Every operation runs with the lock held, so calls on
/// the same wallet are serialized.
#[derive(Clone)]
pub struct SharedWalletStore(Arc<Mutex<WalletStore>>);

impl SharedWalletStore {
    pub fn new(inner: WalletStore) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    /// Build a store for `name` under `paths`, applying the persisted
    /// backend configuration.
    pub fn initialize(paths: WalletPaths, name: impl Into<String>) -> WalletResult<Self> {
        paths.ensure_directories()?;
        let config = ConfigStore::from_paths(&paths).load_or_default()?;
        Ok(Self::new(WalletStore::with_config(name, paths, &config)?))
    }

    pub fn with<F, T>(&self, op: F) -> WalletResult<T>
    where
        F: FnOnce(&mut WalletStore) -> WalletResult<T>,
    {
        let mut guard = self.0.lock();
        op(&mut guard)
    }

    pub fn is_open(&self) -> bool {
        self.0.lock().is_open()
    }
}

impl std::fmt::Debug for SharedWalletStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_lock() {
            Some(store) => f.debug_tuple("SharedWalletStore").field(&*store).finish(),
            None => f.write_str("SharedWalletStore(<locked>)"),
        }
    }
}
