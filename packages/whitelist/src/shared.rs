//! Process-wide whitelist handle.
//!
//! Readers take a [`snapshot`](SharedWhitelist::snapshot) (an `Arc` clone)
//! and use it for a whole request without holding any lock. Reloads build a
//! complete new [`PlmnWhitelist`] first and then swap the `Arc`, so a
//! request never observes a partially loaded whitelist.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::whitelist::{PlmnWhitelist, WhitelistOptions};
use crate::WhitelistError;

/// Shared, swappable whitelist.
#[derive(Debug, Default)]
pub struct SharedWhitelist {
    current: RwLock<Arc<PlmnWhitelist>>,
}

impl SharedWhitelist {
    /// Wraps an already built whitelist.
    #[must_use]
    pub fn new(whitelist: PlmnWhitelist) -> Self {
        Self {
            current: RwLock::new(Arc::new(whitelist)),
        }
    }

    /// The current whitelist. Later reloads do not affect the returned value.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PlmnWhitelist> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the whitelist and returns the previous one.
    pub fn replace(&self, whitelist: PlmnWhitelist) -> Arc<PlmnWhitelist> {
        let next = Arc::new(whitelist);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Loads the dataset at `path` and swaps it in.
    ///
    /// On error the current whitelist is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`WhitelistError`] if the dataset cannot be loaded.
    pub fn reload_from_path(
        &self,
        path: &Path,
        options: &WhitelistOptions,
    ) -> Result<Arc<PlmnWhitelist>, WhitelistError> {
        let whitelist = PlmnWhitelist::from_path(path, options)?;
        log::info!("Swapping in reloaded whitelist ({} entries)", whitelist.len());
        self.replace(whitelist);
        Ok(self.snapshot())
    }
}

impl From<PlmnWhitelist> for SharedWhitelist {
    fn from(value: PlmnWhitelist) -> Self {
        Self::new(value)
    }
}
