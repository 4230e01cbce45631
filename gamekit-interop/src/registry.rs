//! Interop object factory
//!
//! Tracks the objects the bridge has handed to the native runtime as callback
//! targets. Each entry is indexed twice: by the key of the proxy that owns it
//! (so a proxy never gets a second forwarder) and by the native handle of the
//! object itself (so native callbacks can find their way back).
//!
//! The factory is an ordinary value, not global state; every [`crate::Bridge`]
//! owns one and tests build as many isolated ones as they need.

use crate::types::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct Entries<T> {
    by_key: HashMap<usize, Arc<T>>,
    key_by_native: HashMap<usize, usize>,
}

/// Registry guaranteeing at most one interop object per key
pub struct InteropObjectFactory<T> {
    entries: Mutex<Entries<T>>,
}

impl<T> InteropObjectFactory<T> {
    /// Create an empty factory
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                by_key: HashMap::new(),
                key_by_native: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries<T>> {
        // A panicking constructor leaves the maps untouched, so the data is
        // still consistent after poisoning
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the object registered for `key`, creating it if needed
    ///
    /// `constructor` runs at most once and only when no entry exists; the new
    /// object is indexed under the native handle `handle_extractor` reports.
    /// Lookup and insertion happen under one lock, so concurrent callers for
    /// the same key all receive the same object.
    pub fn get_or_create<C, H>(&self, key: usize, constructor: C, handle_extractor: H) -> Result<Arc<T>>
    where
        C: FnOnce() -> Result<T>,
        H: FnOnce(&T) -> usize,
    {
        let mut entries = self.lock();

        if let Some(existing) = entries.by_key.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let object = Arc::new(constructor()?);
        let native = handle_extractor(&object);

        entries.key_by_native.insert(native, key);
        entries.by_key.insert(key, Arc::clone(&object));
        log::debug!(
            "Registered interop object 0x{:X} for key 0x{:X} ({} live)",
            native,
            key,
            entries.by_key.len()
        );

        Ok(object)
    }

    /// The object registered for `key`, if any
    pub fn get(&self, key: usize) -> Option<Arc<T>> {
        self.lock().by_key.get(&key).cloned()
    }

    /// The object whose native handle is `native`, if it is still registered
    pub fn find_by_native(&self, native: usize) -> Option<Arc<T>> {
        let entries = self.lock();
        let key = entries.key_by_native.get(&native)?;
        entries.by_key.get(key).cloned()
    }

    /// Unregister the object for `key`, returning it
    pub fn remove(&self, key: usize) -> Option<Arc<T>> {
        let mut entries = self.lock();
        let removed = entries.by_key.remove(&key)?;
        entries.key_by_native.retain(|_, owner| *owner != key);
        log::debug!(
            "Unregistered interop object for key 0x{:X} ({} live)",
            key,
            entries.by_key.len()
        );
        Some(removed)
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for InteropObjectFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}
