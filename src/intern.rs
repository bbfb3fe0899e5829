//! A reference-counted string-interning pool.
//!
//! The pool is an explicitly constructed, cheaply clonable handle; there
//! is no global instance. It keeps only non-owning entries, keyed by the
//! 32-bit FNV-1a hash of the contents: ownership of an interned string
//! lives entirely with the [`StrRef`] holders, and the entry is removed
//! exactly when the last holder drops. Interning the same contents twice
//! while a holder is alive yields pointer-identical references, so
//! [`StrRef`] comparison and hashing are pointer operations.
//!
//! This is the one deliberately lock-based component of the crate: a
//! conventional mutex-protected cache, not a lock-free structure.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// 32-bit FNV-1a hash of `bytes`.
#[must_use]
pub const fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = 0x811c_9dc5_u32;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(0x0100_0193);
        i += 1;
    }
    hash
}

/// An interned string plus the back reference that lets the last holder
/// clear the pool entry.
struct PooledStr {
    hash: u32,
    data: Box<str>,
    pool: Weak<Shared>,
}

impl Drop for PooledStr {
    fn drop(&mut self) {
        let Some(shared) = self.pool.upgrade() else {
            return;
        };
        let mut entries = shared.lock_entries();
        // A concurrent intern may already have replaced the entry with a
        // live string; only a dead entry belongs to this holder.
        if let Some(weak) = entries.get(&self.hash) {
            if weak.strong_count() == 0 {
                entries.remove(&self.hash);
                #[cfg(feature = "tracing")]
                tracing::trace!(hash = self.hash, "released interned string");
            }
        }
    }
}

struct Shared {
    entries: Mutex<HashMap<u32, Weak<PooledStr>>>,
}

impl Shared {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<u32, Weak<PooledStr>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A string-interning pool. Clones share the same underlying cache.
#[derive(Clone)]
pub struct StringPool {
    shared: Arc<Shared>,
}

impl StringPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the canonical shared string for `s`, creating it if no live
    /// holder exists.
    ///
    /// Entries are keyed by the FNV-1a hash alone, so two strings hashing
    /// equal are treated as the same string.
    pub fn intern(&self, s: &str) -> StrRef {
        let hash = fnv1a(s.as_bytes());
        let mut entries = self.shared.lock_entries();
        let ptr = match entries.entry(hash) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(existing) => existing,
                None => {
                    // The last holder is mid-drop; replace the dead entry.
                    let fresh = self.alloc(hash, s);
                    entry.insert(Arc::downgrade(&fresh));
                    fresh
                }
            },
            Entry::Vacant(entry) => {
                let fresh = self.alloc(hash, s);
                entry.insert(Arc::downgrade(&fresh));
                fresh
            }
        };
        StrRef { ptr }
    }

    fn alloc(&self, hash: u32, s: &str) -> Arc<PooledStr> {
        #[cfg(feature = "tracing")]
        tracing::trace!(hash, len = s.len(), "interned new string");
        Arc::new(PooledStr {
            hash,
            data: Box::from(s),
            pool: Arc::downgrade(&self.shared),
        })
    }

    /// Whether a string with these contents is currently interned.
    #[must_use]
    pub fn contains(&self, s: &str) -> bool {
        self.get_by_hash(fnv1a(s.as_bytes())).is_some()
    }

    /// Looks up a live interned string by its raw FNV-1a hash.
    #[must_use]
    pub fn get_by_hash(&self, hash: u32) -> Option<StrRef> {
        self.shared
            .lock_entries()
            .get(&hash)
            .and_then(Weak::upgrade)
            .map(|ptr| StrRef { ptr })
    }

    /// Number of entries at the time of the call.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock_entries().len()
    }

    /// Returns `true` if the pool held no entries at the time of the call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A reference-counted handle to an interned string.
///
/// Dereferences to `str`; equality and hashing are by pointer identity, so
/// any number of `StrRef`s to the same contents collapse in a hash set.
pub struct StrRef {
    ptr: Arc<PooledStr>,
}

impl StrRef {
    /// The interned contents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.ptr.data
    }

    /// Number of live holders of this string, this one included.
    #[must_use]
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.ptr)
    }
}

impl Clone for StrRef {
    fn clone(&self) -> Self {
        Self {
            ptr: Arc::clone(&self.ptr),
        }
    }
}

impl Deref for StrRef {
    type Target = str;
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for StrRef {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for StrRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ptr, &other.ptr)
    }
}

impl Eq for StrRef {}

impl Hash for StrRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.ptr) as usize).hash(state);
    }
}

impl fmt::Display for StrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for StrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}
