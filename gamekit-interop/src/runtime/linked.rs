//! Native runtime for iOS builds where the bridge is linked into the app
//!
//! The entry points are exported by the Objective-C bridge compiled into the
//! application binary, so no library name is given: the linker resolves them
//! from the final executable.

#![cfg(target_os = "ios")]

use super::{
    read_native_string, DelegateCallbacks, DidFailWithErrorCallback, NativeRuntime,
    ReleaseContextCallback, WasCancelledCallback,
};
use crate::types::RawHandle;
use std::ffi::{c_char, c_int, c_void, CStr};

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFRetain(object: RawHandle) -> RawHandle;
    fn CFRelease(object: RawHandle);
}

#[allow(non_snake_case)]
extern "C" {
    fn GKMatchRequest_new() -> RawHandle;
    fn GKMatchRequest_minPlayers(request: RawHandle) -> usize;
    fn GKMatchRequest_setMinPlayers(request: RawHandle, value: usize);
    fn GKMatchRequest_maxPlayers(request: RawHandle) -> usize;
    fn GKMatchRequest_setMaxPlayers(request: RawHandle, value: usize);
    fn GKMatchRequest_inviteMessage(request: RawHandle, buffer: *mut c_char, size: c_int) -> c_int;
    fn GKMatchRequest_setInviteMessage(request: RawHandle, message: *const c_char);

    fn GKTurnBasedMatchmakerViewController_initWithMatchRequest(request: RawHandle) -> RawHandle;
    fn GKTurnBasedMatchmakerViewController_showExistingMatches(view_controller: RawHandle) -> bool;
    fn GKTurnBasedMatchmakerViewController_setShowExistingMatches(view_controller: RawHandle, value: bool);
    fn GKTurnBasedMatchmakerViewController_turnBasedMatchmakerDelegate(view_controller: RawHandle) -> RawHandle;
    fn GKTurnBasedMatchmakerViewController_setTurnBasedMatchmakerDelegate(
        view_controller: RawHandle,
        delegate: RawHandle,
    );

    fn InteropGKTurnBasedMatchmakerViewControllerDelegate_new(
        context: *mut c_void,
        was_cancelled: WasCancelledCallback,
        did_fail_with_error: DidFailWithErrorCallback,
        release_context: ReleaseContextCallback,
    ) -> RawHandle;

    fn NSError_code(error: RawHandle) -> isize;
    fn NSError_domain(error: RawHandle, buffer: *mut c_char, size: c_int) -> c_int;
    fn NSError_localizedDescription(error: RawHandle, buffer: *mut c_char, size: c_int) -> c_int;
}

/// Native runtime using symbols linked into the app binary
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkedRuntime;

impl LinkedRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl NativeRuntime for LinkedRuntime {
    fn name(&self) -> &str {
        "linked"
    }

    fn retain(&self, object: RawHandle) {
        unsafe { CFRetain(object) };
    }

    fn release(&self, object: RawHandle) {
        unsafe { CFRelease(object) }
    }

    fn match_request_new(&self) -> RawHandle {
        unsafe { GKMatchRequest_new() }
    }

    fn match_request_min_players(&self, request: RawHandle) -> usize {
        unsafe { GKMatchRequest_minPlayers(request) }
    }

    fn match_request_set_min_players(&self, request: RawHandle, value: usize) {
        unsafe { GKMatchRequest_setMinPlayers(request, value) }
    }

    fn match_request_max_players(&self, request: RawHandle) -> usize {
        unsafe { GKMatchRequest_maxPlayers(request) }
    }

    fn match_request_set_max_players(&self, request: RawHandle, value: usize) {
        unsafe { GKMatchRequest_setMaxPlayers(request, value) }
    }

    fn match_request_invite_message(&self, request: RawHandle) -> Option<String> {
        read_native_string(|buffer, size| unsafe { GKMatchRequest_inviteMessage(request, buffer, size) })
    }

    fn match_request_set_invite_message(&self, request: RawHandle, message: Option<&CStr>) {
        let ptr = message.map_or(std::ptr::null(), CStr::as_ptr);
        unsafe { GKMatchRequest_setInviteMessage(request, ptr) }
    }

    fn matchmaker_init_with_match_request(&self, request: RawHandle) -> RawHandle {
        unsafe { GKTurnBasedMatchmakerViewController_initWithMatchRequest(request) }
    }

    fn matchmaker_show_existing_matches(&self, view_controller: RawHandle) -> bool {
        unsafe { GKTurnBasedMatchmakerViewController_showExistingMatches(view_controller) }
    }

    fn matchmaker_set_show_existing_matches(&self, view_controller: RawHandle, value: bool) {
        unsafe { GKTurnBasedMatchmakerViewController_setShowExistingMatches(view_controller, value) }
    }

    fn matchmaker_delegate(&self, view_controller: RawHandle) -> RawHandle {
        unsafe { GKTurnBasedMatchmakerViewController_turnBasedMatchmakerDelegate(view_controller) }
    }

    fn matchmaker_set_delegate(&self, view_controller: RawHandle, delegate: RawHandle) {
        unsafe { GKTurnBasedMatchmakerViewController_setTurnBasedMatchmakerDelegate(view_controller, delegate) }
    }

    fn matchmaker_delegate_new(&self, callbacks: DelegateCallbacks) -> RawHandle {
        unsafe {
            InteropGKTurnBasedMatchmakerViewControllerDelegate_new(
                callbacks.context,
                callbacks.was_cancelled,
                callbacks.did_fail_with_error,
                callbacks.release_context,
            )
        }
    }

    fn error_code(&self, error: RawHandle) -> i64 {
        unsafe { NSError_code(error) as i64 }
    }

    fn error_domain(&self, error: RawHandle) -> Option<String> {
        read_native_string(|buffer, size| unsafe { NSError_domain(error, buffer, size) })
    }

    fn error_localized_description(&self, error: RawHandle) -> Option<String> {
        read_native_string(|buffer, size| unsafe { NSError_localizedDescription(error, buffer, size) })
    }
}
