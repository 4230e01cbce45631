//! The native ABI surface
//!
//! [`NativeRuntime`] mirrors the C entry points exported by the native GameKit
//! bridge, one method per symbol, with the receiver handle always passed first.
//! Backends:
//! - [`DynamicRuntime`]: symbols resolved from a shared library at runtime
//! - `LinkedRuntime`: symbols resolved by the linker (iOS builds only)
//! - [`crate::simulator::SimulatedRuntime`]: in-process stand-in for tests
//!
//! # Handle contract
//!
//! Methods take raw handles and are safe to call only with handles obtained
//! from this runtime that are still alive. The bridge upholds this by routing
//! every call through [`crate::handle::NativeHandle::as_raw`], which refuses
//! null and released handles.

use crate::types::RawHandle;
use std::ffi::{c_char, c_int, c_void, CStr};

pub mod dynamic;
#[cfg(target_os = "ios")]
pub mod linked;

pub use dynamic::{DynamicRuntime, SymbolStatus};
#[cfg(target_os = "ios")]
pub use linked::LinkedRuntime;

/// Native callback: the player cancelled matchmaking
pub type WasCancelledCallback =
    extern "C" fn(context: *mut c_void, delegate: RawHandle, view_controller: RawHandle);

/// Native callback: matchmaking failed with an `NSError*`
pub type DidFailWithErrorCallback = extern "C" fn(
    context: *mut c_void,
    delegate: RawHandle,
    view_controller: RawHandle,
    error: RawHandle,
);

/// Native callback: the delegate object deallocated and no longer needs `context`
pub type ReleaseContextCallback = extern "C" fn(context: *mut c_void);

/// Callback table handed to `InteropGKTurnBasedMatchmakerViewControllerDelegate_new`
///
/// The native delegate object stores these and calls them on whatever thread
/// GameKit delivers the event on. `release_context` is called exactly once, when
/// the native delegate object deallocates.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DelegateCallbacks {
    pub context: *mut c_void,
    pub was_cancelled: WasCancelledCallback,
    pub did_fail_with_error: DidFailWithErrorCallback,
    pub release_context: ReleaseContextCallback,
}

/// Every symbol a native bridge library must export
pub const REQUIRED_SYMBOLS: &[&str] = &[
    "CFRetain",
    "CFRelease",
    "GKMatchRequest_new",
    "GKMatchRequest_minPlayers",
    "GKMatchRequest_setMinPlayers",
    "GKMatchRequest_maxPlayers",
    "GKMatchRequest_setMaxPlayers",
    "GKMatchRequest_inviteMessage",
    "GKMatchRequest_setInviteMessage",
    "GKTurnBasedMatchmakerViewController_initWithMatchRequest",
    "GKTurnBasedMatchmakerViewController_showExistingMatches",
    "GKTurnBasedMatchmakerViewController_setShowExistingMatches",
    "GKTurnBasedMatchmakerViewController_turnBasedMatchmakerDelegate",
    "GKTurnBasedMatchmakerViewController_setTurnBasedMatchmakerDelegate",
    "InteropGKTurnBasedMatchmakerViewControllerDelegate_new",
    "NSError_code",
    "NSError_domain",
    "NSError_localizedDescription",
];

/// The foreign runtime as seen by the bridge
pub trait NativeRuntime: Send + Sync {
    /// Short backend name for logs and reports
    fn name(&self) -> &str;

    /// `CFRetain`
    fn retain(&self, object: RawHandle);
    /// `CFRelease`
    fn release(&self, object: RawHandle);

    /// `GKMatchRequest_new`: +1 retained, or null
    fn match_request_new(&self) -> RawHandle;
    fn match_request_min_players(&self, request: RawHandle) -> usize;
    fn match_request_set_min_players(&self, request: RawHandle, value: usize);
    fn match_request_max_players(&self, request: RawHandle) -> usize;
    fn match_request_set_max_players(&self, request: RawHandle, value: usize);
    fn match_request_invite_message(&self, request: RawHandle) -> Option<String>;
    fn match_request_set_invite_message(&self, request: RawHandle, message: Option<&CStr>);

    /// `GKTurnBasedMatchmakerViewController_initWithMatchRequest`: +1 retained, or null
    fn matchmaker_init_with_match_request(&self, request: RawHandle) -> RawHandle;
    fn matchmaker_show_existing_matches(&self, view_controller: RawHandle) -> bool;
    fn matchmaker_set_show_existing_matches(&self, view_controller: RawHandle, value: bool);
    fn matchmaker_delegate(&self, view_controller: RawHandle) -> RawHandle;
    fn matchmaker_set_delegate(&self, view_controller: RawHandle, delegate: RawHandle);

    /// `InteropGKTurnBasedMatchmakerViewControllerDelegate_new`: +1 retained, or null
    fn matchmaker_delegate_new(&self, callbacks: DelegateCallbacks) -> RawHandle;

    fn error_code(&self, error: RawHandle) -> i64;
    fn error_domain(&self, error: RawHandle) -> Option<String>;
    fn error_localized_description(&self, error: RawHandle) -> Option<String>;
}

const INITIAL_STRING_BUFFER: usize = 128;

/// Read a string through the native buffer convention
///
/// `fill(buffer, size)` copies at most `size - 1` bytes plus a NUL into
/// `buffer` and returns the full length in bytes, or a negative value for nil.
/// The call is repeated once with a large enough buffer when the string was
/// truncated.
pub(crate) fn read_native_string<F>(mut fill: F) -> Option<String>
where
    F: FnMut(*mut c_char, c_int) -> c_int,
{
    let mut buffer = vec![0u8; INITIAL_STRING_BUFFER];

    loop {
        let size = c_int::try_from(buffer.len()).unwrap_or(c_int::MAX);
        let length = fill(buffer.as_mut_ptr().cast::<c_char>(), size);
        if length < 0 {
            return None;
        }

        let length = length as usize;
        if length < buffer.len() {
            buffer.truncate(length);
            return Some(String::from_utf8_lossy(&buffer).into_owned());
        }

        buffer.resize(length + 1, 0);
    }
}

/// Write `value` into a native-convention string buffer
///
/// Counterpart of [`read_native_string`], used by backends that produce
/// strings in Rust (the simulator) and by tests.
pub(crate) fn write_native_string(value: Option<&str>, buffer: *mut c_char, size: c_int) -> c_int {
    let Some(value) = value else {
        return -1;
    };

    let bytes = value.as_bytes();
    if !buffer.is_null() && size > 0 {
        let copied = bytes.len().min(size as usize - 1);
        // SAFETY: caller guarantees `buffer` holds `size` bytes
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.cast::<u8>(), copied);
            *buffer.add(copied) = 0;
        }
    }

    c_int::try_from(bytes.len()).unwrap_or(c_int::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_short_string() {
        let value = read_native_string(|buf, size| write_native_string(Some("GKErrorDomain"), buf, size));
        assert_eq!(value.as_deref(), Some("GKErrorDomain"));
    }

    #[test]
    fn test_read_string_longer_than_initial_buffer() {
        let long = "x".repeat(INITIAL_STRING_BUFFER * 3);
        let mut calls = 0;
        let value = read_native_string(|buf, size| {
            calls += 1;
            write_native_string(Some(&long), buf, size)
        });
        assert_eq!(value.as_deref(), Some(long.as_str()));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_read_string_exactly_buffer_sized() {
        // No room for the NUL, so a second pass is required
        let exact = "y".repeat(INITIAL_STRING_BUFFER);
        let value = read_native_string(|buf, size| write_native_string(Some(&exact), buf, size));
        assert_eq!(value.as_deref(), Some(exact.as_str()));
    }

    #[test]
    fn test_read_nil_string() {
        assert_eq!(read_native_string(|buf, size| write_native_string(None, buf, size)), None);
    }

    #[test]
    fn test_symbol_list_has_no_duplicates() {
        let mut names = REQUIRED_SYMBOLS.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), REQUIRED_SYMBOLS.len());
    }
}
