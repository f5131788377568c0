//! Persistent key/value storage contract used to remember user keys.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Composite key scoping a stored value to one provider, user and license.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey {
    pub provider_id: String,
    pub user_id: String,
    pub license_id: String,
}

impl StorageKey {
    pub fn new(
        provider_id: impl Into<String>,
        user_id: impl Into<String>,
        license_id: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            user_id: user_id.into(),
            license_id: license_id.into(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider_id, self.user_id, self.license_id)
    }
}

/// Storage supplied by the embedding application.
pub trait StorageProvider: Send + Sync {
    fn get(&self, key: &StorageKey) -> Option<String>;
    fn put(&self, key: &StorageKey, value: &str);
}

/// Process-local storage. Values are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorageProvider {
    values: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStorageProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageProvider for MemoryStorageProvider {
    fn get(&self, key: &StorageKey) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: &StorageKey, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), value.to_string());
    }
}
