//! Owned references to native objects
//!
//! A [`NativeHandle`] holds exactly one reference to a foreign object and gives
//! it back exactly once, whether the owner disposes it explicitly or simply
//! drops it.

use crate::runtime::NativeRuntime;
use crate::types::{InteropError, RawHandle, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One counted reference to a native object
pub struct NativeHandle {
    raw: RawHandle,
    released: AtomicBool,
    runtime: Arc<dyn NativeRuntime>,
}

impl NativeHandle {
    /// Take over the +1 reference returned by a native constructor
    ///
    /// The constructor's implicit reference becomes the one this handle
    /// releases, so no extra retain/release pair is issued. A null `raw` is
    /// accepted and produces a handle whose [`as_raw`](Self::as_raw) fails.
    pub fn adopt(runtime: Arc<dyn NativeRuntime>, raw: RawHandle) -> Self {
        Self {
            raw,
            released: AtomicBool::new(false),
            runtime,
        }
    }

    /// Wrap a handle borrowed from the native side, retaining it
    pub fn retain(runtime: Arc<dyn NativeRuntime>, raw: RawHandle) -> Self {
        if !raw.is_null() {
            runtime.retain(raw);
        }
        Self::adopt(runtime, raw)
    }

    /// True if the native constructor returned null
    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }

    /// True once the reference has been given back
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// The raw handle, if it is still usable for native calls
    ///
    /// `owner` names the proxy type in the returned error.
    pub fn as_raw(&self, owner: &'static str) -> Result<RawHandle> {
        if self.raw.is_null() || self.is_released() {
            return Err(InteropError::InvalidHandle(owner));
        }
        Ok(self.raw)
    }

    /// Identity of the native object, used as a registry key
    pub fn id(&self) -> usize {
        self.raw as usize
    }

    /// Give the reference back to the native runtime
    ///
    /// Returns true if this call performed the release. Later calls, and calls
    /// on a null handle, do nothing.
    pub fn release(&self) -> bool {
        if self.raw.is_null() {
            return false;
        }
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.runtime.release(self.raw);
        log::trace!("Released native object 0x{:X}", self.id());
        true
    }

    pub(crate) fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        &self.runtime
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("raw", &self.raw)
            .field("released", &self.is_released())
            .finish()
    }
}

// The native objects wrapped here are reference counted with thread-safe
// retain/release, and the handle itself is only ever read after construction.
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}
