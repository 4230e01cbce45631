//! Native runtime backed by a dynamically loaded bridge library
//!
//! The library is opened with `libloading` and every entry point is resolved
//! once, up front. Resolved function pointers are stored next to the
//! [`Library`] so they stay valid for as long as the runtime exists.

use super::{
    read_native_string, DelegateCallbacks, DidFailWithErrorCallback, NativeRuntime,
    ReleaseContextCallback, WasCancelledCallback, REQUIRED_SYMBOLS,
};
use crate::types::{InteropError, RawHandle, Result};
use libloading::Library;
use serde::Serialize;
use std::ffi::{c_char, c_int, c_void, CStr};
use std::path::{Path, PathBuf};

type RetainFn = unsafe extern "C" fn(RawHandle) -> RawHandle;
type ReleaseFn = unsafe extern "C" fn(RawHandle);
type NewFn = unsafe extern "C" fn() -> RawHandle;
type GetUIntegerFn = unsafe extern "C" fn(RawHandle) -> usize;
type SetUIntegerFn = unsafe extern "C" fn(RawHandle, usize);
type GetIntegerFn = unsafe extern "C" fn(RawHandle) -> isize;
type GetStringFn = unsafe extern "C" fn(RawHandle, *mut c_char, c_int) -> c_int;
type SetStringFn = unsafe extern "C" fn(RawHandle, *const c_char);
type InitWithHandleFn = unsafe extern "C" fn(RawHandle) -> RawHandle;
// Marshaled as a single byte on both sides
type GetBoolFn = unsafe extern "C" fn(RawHandle) -> bool;
type SetBoolFn = unsafe extern "C" fn(RawHandle, bool);
type GetHandleFn = unsafe extern "C" fn(RawHandle) -> RawHandle;
type SetHandleFn = unsafe extern "C" fn(RawHandle, RawHandle);
type DelegateNewFn = unsafe extern "C" fn(
    *mut c_void,
    WasCancelledCallback,
    DidFailWithErrorCallback,
    ReleaseContextCallback,
) -> RawHandle;

/// Resolve one symbol, copying the function pointer out of the `Symbol` guard
macro_rules! resolve {
    ($library:expr, $name:literal, $ty:ty) => {{
        // SAFETY: the declared type matches the native bridge header
        let symbol = unsafe { $library.get::<$ty>(concat!($name, "\0").as_bytes()) }
            .map_err(|_| InteropError::MissingSymbol($name.to_string()))?;
        *symbol
    }};
}

struct SymbolTable {
    retain: RetainFn,
    release: ReleaseFn,
    match_request_new: NewFn,
    match_request_min_players: GetUIntegerFn,
    match_request_set_min_players: SetUIntegerFn,
    match_request_max_players: GetUIntegerFn,
    match_request_set_max_players: SetUIntegerFn,
    match_request_invite_message: GetStringFn,
    match_request_set_invite_message: SetStringFn,
    matchmaker_init_with_match_request: InitWithHandleFn,
    matchmaker_show_existing_matches: GetBoolFn,
    matchmaker_set_show_existing_matches: SetBoolFn,
    matchmaker_delegate: GetHandleFn,
    matchmaker_set_delegate: SetHandleFn,
    matchmaker_delegate_new: DelegateNewFn,
    error_code: GetIntegerFn,
    error_domain: GetStringFn,
    error_localized_description: GetStringFn,
}

impl SymbolTable {
    fn resolve(library: &Library) -> Result<Self> {
        Ok(Self {
            retain: resolve!(library, "CFRetain", RetainFn),
            release: resolve!(library, "CFRelease", ReleaseFn),
            match_request_new: resolve!(library, "GKMatchRequest_new", NewFn),
            match_request_min_players: resolve!(library, "GKMatchRequest_minPlayers", GetUIntegerFn),
            match_request_set_min_players: resolve!(library, "GKMatchRequest_setMinPlayers", SetUIntegerFn),
            match_request_max_players: resolve!(library, "GKMatchRequest_maxPlayers", GetUIntegerFn),
            match_request_set_max_players: resolve!(library, "GKMatchRequest_setMaxPlayers", SetUIntegerFn),
            match_request_invite_message: resolve!(library, "GKMatchRequest_inviteMessage", GetStringFn),
            match_request_set_invite_message: resolve!(library, "GKMatchRequest_setInviteMessage", SetStringFn),
            matchmaker_init_with_match_request: resolve!(
                library,
                "GKTurnBasedMatchmakerViewController_initWithMatchRequest",
                InitWithHandleFn
            ),
            matchmaker_show_existing_matches: resolve!(
                library,
                "GKTurnBasedMatchmakerViewController_showExistingMatches",
                GetBoolFn
            ),
            matchmaker_set_show_existing_matches: resolve!(
                library,
                "GKTurnBasedMatchmakerViewController_setShowExistingMatches",
                SetBoolFn
            ),
            matchmaker_delegate: resolve!(
                library,
                "GKTurnBasedMatchmakerViewController_turnBasedMatchmakerDelegate",
                GetHandleFn
            ),
            matchmaker_set_delegate: resolve!(
                library,
                "GKTurnBasedMatchmakerViewController_setTurnBasedMatchmakerDelegate",
                SetHandleFn
            ),
            matchmaker_delegate_new: resolve!(
                library,
                "InteropGKTurnBasedMatchmakerViewControllerDelegate_new",
                DelegateNewFn
            ),
            error_code: resolve!(library, "NSError_code", GetIntegerFn),
            error_domain: resolve!(library, "NSError_domain", GetStringFn),
            error_localized_description: resolve!(library, "NSError_localizedDescription", GetStringFn),
        })
    }
}

/// Whether a single expected symbol was found in a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolStatus {
    pub name: &'static str,
    pub present: bool,
}

/// Native runtime whose entry points live in a shared library
pub struct DynamicRuntime {
    symbols: SymbolTable,
    path: PathBuf,
    // Must outlive `symbols`
    _library: Library,
}

impl DynamicRuntime {
    /// Open a bridge library and resolve every required symbol
    ///
    /// Fails with [`InteropError::MissingSymbol`] naming the first absent entry
    /// point, so a mismatched library is rejected before any proxy exists.
    pub fn open(path: &Path) -> Result<Self> {
        log::info!("Loading native bridge library: {:?}", path);

        let library = load_library(path)?;
        let symbols = SymbolTable::resolve(&library)?;

        log::info!("Resolved {} native symbols from {:?}", REQUIRED_SYMBOLS.len(), path);

        Ok(Self {
            symbols,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    /// Report which required symbols a library exports, without failing on gaps
    pub fn probe(path: &Path) -> Result<Vec<SymbolStatus>> {
        let library = load_library(path)?;

        let statuses = REQUIRED_SYMBOLS
            .iter()
            .map(|&name| {
                let mut symbol_name = name.as_bytes().to_vec();
                symbol_name.push(0);
                // SAFETY: the symbol is only checked for presence, never called
                let present = unsafe { library.get::<*const c_void>(&symbol_name) }.is_ok();
                if !present {
                    log::debug!("Symbol not exported: {}", name);
                }
                SymbolStatus { name, present }
            })
            .collect();

        Ok(statuses)
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_library(path: &Path) -> Result<Library> {
    if !path.exists() {
        return Err(InteropError::LibraryLoad(format!(
            "Native library not found: {:?}",
            path
        )));
    }

    // SAFETY: loading runs the library's initialisers; the bridge library is
    // expected to have none with side effects beyond registering classes
    unsafe { Library::new(path) }
        .map_err(|e| InteropError::LibraryLoad(format!("{:?}: {}", path, e)))
}

// All calls below forward handles the bridge obtained from this library and
// keeps alive; see the handle contract on `NativeRuntime`.
impl NativeRuntime for DynamicRuntime {
    fn name(&self) -> &str {
        "dynamic"
    }

    fn retain(&self, object: RawHandle) {
        unsafe { (self.symbols.retain)(object) };
    }

    fn release(&self, object: RawHandle) {
        unsafe { (self.symbols.release)(object) }
    }

    fn match_request_new(&self) -> RawHandle {
        unsafe { (self.symbols.match_request_new)() }
    }

    fn match_request_min_players(&self, request: RawHandle) -> usize {
        unsafe { (self.symbols.match_request_min_players)(request) }
    }

    fn match_request_set_min_players(&self, request: RawHandle, value: usize) {
        unsafe { (self.symbols.match_request_set_min_players)(request, value) }
    }

    fn match_request_max_players(&self, request: RawHandle) -> usize {
        unsafe { (self.symbols.match_request_max_players)(request) }
    }

    fn match_request_set_max_players(&self, request: RawHandle, value: usize) {
        unsafe { (self.symbols.match_request_set_max_players)(request, value) }
    }

    fn match_request_invite_message(&self, request: RawHandle) -> Option<String> {
        read_native_string(|buffer, size| unsafe {
            (self.symbols.match_request_invite_message)(request, buffer, size)
        })
    }

    fn match_request_set_invite_message(&self, request: RawHandle, message: Option<&CStr>) {
        let ptr = message.map_or(std::ptr::null(), CStr::as_ptr);
        unsafe { (self.symbols.match_request_set_invite_message)(request, ptr) }
    }

    fn matchmaker_init_with_match_request(&self, request: RawHandle) -> RawHandle {
        unsafe { (self.symbols.matchmaker_init_with_match_request)(request) }
    }

    fn matchmaker_show_existing_matches(&self, view_controller: RawHandle) -> bool {
        unsafe { (self.symbols.matchmaker_show_existing_matches)(view_controller) }
    }

    fn matchmaker_set_show_existing_matches(&self, view_controller: RawHandle, value: bool) {
        unsafe { (self.symbols.matchmaker_set_show_existing_matches)(view_controller, value) }
    }

    fn matchmaker_delegate(&self, view_controller: RawHandle) -> RawHandle {
        unsafe { (self.symbols.matchmaker_delegate)(view_controller) }
    }

    fn matchmaker_set_delegate(&self, view_controller: RawHandle, delegate: RawHandle) {
        unsafe { (self.symbols.matchmaker_set_delegate)(view_controller, delegate) }
    }

    fn matchmaker_delegate_new(&self, callbacks: DelegateCallbacks) -> RawHandle {
        unsafe {
            (self.symbols.matchmaker_delegate_new)(
                callbacks.context,
                callbacks.was_cancelled,
                callbacks.did_fail_with_error,
                callbacks.release_context,
            )
        }
    }

    fn error_code(&self, error: RawHandle) -> i64 {
        unsafe { (self.symbols.error_code)(error) as i64 }
    }

    fn error_domain(&self, error: RawHandle) -> Option<String> {
        read_native_string(|buffer, size| unsafe { (self.symbols.error_domain)(error, buffer, size) })
    }

    fn error_localized_description(&self, error: RawHandle) -> Option<String> {
        read_native_string(|buffer, size| unsafe {
            (self.symbols.error_localized_description)(error, buffer, size)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_library() {
        let result = DynamicRuntime::open(Path::new("nonexistent/libgamekit_bridge.dylib"));
        assert!(matches!(result, Err(InteropError::LibraryLoad(_))));
    }

    #[test]
    fn test_probe_missing_library() {
        let result = DynamicRuntime::probe(Path::new("nonexistent/libgamekit_bridge.so"));
        assert!(result.is_err());
    }

    #[test]
    fn test_open_non_library_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_library.so");
        std::fs::write(&path, b"definitely not an object file").unwrap();

        let result = DynamicRuntime::open(&path);
        assert!(matches!(result, Err(InteropError::LibraryLoad(_))));
    }
}
