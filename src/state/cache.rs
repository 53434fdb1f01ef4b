//! Single-slot cache of the last known signed-in user.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `AuthCache` is owned per client session and shared by `Arc` with every
//! consumer. It is the only stored piece of session state: status and the
//! redirect decision are derived from it on demand.
//!
//! DESIGN
//! ======
//! Backed by a `tokio::sync::watch` channel so subscribers are woken on every
//! write. Writes are last-writer-wins and bump a revision counter, which lets
//! a slow fetch detect that someone else already wrote a fresher answer.
//! Writers pass `Option<User>`, so once the slot leaves `Unknown` it can never
//! go back.

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;

use tokio::sync::watch;

use crate::net::types::User;

/// Contents of the cache slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CacheEntry {
    /// No fetch or operation has settled yet.
    #[default]
    Unknown,
    /// Known to have no session.
    Anonymous,
    /// Known signed-in user.
    User(User),
}

impl CacheEntry {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::User(user) => Some(user),
            Self::Unknown | Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl From<Option<User>> for CacheEntry {
    fn from(value: Option<User>) -> Self {
        value.map_or(Self::Anonymous, Self::User)
    }
}

/// Cache entry plus the number of writes that produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub entry: CacheEntry,
    pub revision: u64,
}

pub struct AuthCache {
    tx: watch::Sender<CacheSnapshot>,
}

impl AuthCache {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CacheSnapshot::default());
        Self { tx }
    }

    #[must_use]
    pub fn get(&self) -> CacheEntry {
        self.tx.borrow().entry.clone()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.tx.borrow().revision
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot {
        self.tx.borrow().clone()
    }

    /// Unconditionally store `value` (`None` means no session). Returns the new revision.
    pub fn set(&self, value: Option<User>) -> u64 {
        let mut revision = 0;
        self.tx.send_modify(|slot| {
            slot.entry = CacheEntry::from(value);
            slot.revision += 1;
            revision = slot.revision;
        });
        revision
    }

    /// Store `value` only if no write happened since `expected` was observed.
    ///
    /// Returns `false` and leaves the slot untouched when the revision moved.
    pub fn set_if_revision(&self, expected: u64, value: Option<User>) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.revision != expected {
                return false;
            }
            slot.entry = CacheEntry::from(value);
            slot.revision += 1;
            true
        })
    }

    /// Receiver woken on every successful write.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CacheSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for AuthCache {
    fn default() -> Self {
        Self::new()
    }
}
