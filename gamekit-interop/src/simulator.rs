//! In-process stand-in for the native GameKit bridge
//!
//! [`SimulatedRuntime`] implements [`NativeRuntime`] without any native code.
//! Objects are reference counted the way Core Foundation counts them, the
//! matchmaker's delegate slot is a zeroing weak reference, and events can be
//! fired at a controller from any thread. Every retain, release and dealloc is
//! counted so tests can assert that the bridge balances its references.

use crate::runtime::{write_native_string, DelegateCallbacks, NativeRuntime};
use crate::types::{NsError, RawHandle};
use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::{Mutex, MutexGuard};

const FIRST_ADDRESS: usize = 0x1000;
const ADDRESS_STEP: usize = 0x10;

/// Counters describing everything the simulator has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Objects handed out by constructors (including error objects)
    pub constructed: usize,
    /// Objects whose reference count reached zero
    pub deallocated: usize,
    pub retain_calls: usize,
    pub release_calls: usize,
    /// Releases of objects that were already deallocated
    pub over_releases: usize,
    /// Accessor calls on handles that do not name a live object
    pub invalid_accesses: usize,
    /// Native delegate objects created
    pub delegates_created: usize,
    /// Non-null assignments to a controller's delegate slot
    pub delegate_assignments: usize,
    /// Delegate callback contexts handed back through `release_context`
    pub contexts_released: usize,
    /// Events that reached a delegate callback
    pub callbacks_delivered: usize,
}

#[derive(Clone, Copy)]
struct StoredCallbacks(DelegateCallbacks);

// The context pointer is opaque to the simulator; it is only handed back to
// the callbacks that created it.
unsafe impl Send for StoredCallbacks {}

enum ObjectKind {
    MatchRequest {
        min_players: usize,
        max_players: usize,
        invite_message: Option<String>,
    },
    ViewController {
        show_existing_matches: bool,
        delegate: usize,
    },
    Delegate(StoredCallbacks),
    Error(NsError),
}

struct SimObject {
    ref_count: usize,
    kind: ObjectKind,
}

#[derive(Default)]
struct SimState {
    next_address: usize,
    objects: HashMap<usize, SimObject>,
    stats: SimStats,
    failing_constructions: usize,
}

impl SimState {
    fn allocate(&mut self, kind: ObjectKind) -> RawHandle {
        if self.failing_constructions > 0 {
            self.failing_constructions -= 1;
            return std::ptr::null_mut();
        }

        let address = self.next_address.max(FIRST_ADDRESS);
        self.next_address = address + ADDRESS_STEP;
        self.objects.insert(address, SimObject { ref_count: 1, kind });
        self.stats.constructed += 1;
        address as RawHandle
    }

    fn object_mut(&mut self, handle: RawHandle) -> Option<&mut ObjectKind> {
        match self.objects.get_mut(&(handle as usize)) {
            Some(object) => Some(&mut object.kind),
            None => {
                self.stats.invalid_accesses += 1;
                None
            }
        }
    }

    /// Drop one reference; returns the callbacks to notify if a delegate died
    fn release(&mut self, handle: RawHandle) -> Option<StoredCallbacks> {
        let address = handle as usize;
        self.stats.release_calls += 1;

        let Some(object) = self.objects.get_mut(&address) else {
            self.stats.over_releases += 1;
            return None;
        };

        object.ref_count -= 1;
        if object.ref_count > 0 {
            return None;
        }

        let object = self.objects.remove(&address)?;
        self.stats.deallocated += 1;

        match object.kind {
            ObjectKind::Delegate(callbacks) => {
                // Zero every weak delegate slot that pointed here
                for other in self.objects.values_mut() {
                    if let ObjectKind::ViewController { delegate, .. } = &mut other.kind {
                        if *delegate == address {
                            *delegate = 0;
                        }
                    }
                }
                Some(callbacks)
            }
            _ => None,
        }
    }

    /// Delegate installed on `view_controller`, retained for the duration of a callback
    fn begin_callback(&mut self, view_controller: RawHandle) -> Option<(RawHandle, StoredCallbacks)> {
        let delegate = match self.object_mut(view_controller)? {
            ObjectKind::ViewController { delegate, .. } => *delegate,
            _ => return None,
        };
        if delegate == 0 {
            return None;
        }

        let object = self.objects.get_mut(&delegate)?;
        let ObjectKind::Delegate(callbacks) = object.kind else {
            return None;
        };
        object.ref_count += 1;

        // The controller is also kept alive while its delegate runs
        if let Some(vc) = self.objects.get_mut(&(view_controller as usize)) {
            vc.ref_count += 1;
        }

        Some((delegate as RawHandle, callbacks))
    }
}

/// Simulated native runtime
pub struct SimulatedRuntime {
    state: Mutex<SimState>,
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> SimStats {
        self.lock().stats
    }

    /// Number of objects still alive
    pub fn live_objects(&self) -> usize {
        self.lock().objects.len()
    }

    /// Reference count of a live object, if it exists
    pub fn ref_count(&self, object: RawHandle) -> Option<usize> {
        self.lock().objects.get(&(object as usize)).map(|o| o.ref_count)
    }

    /// Make the next `count` native constructors return null
    pub fn fail_next_constructions(&self, count: usize) {
        self.lock().failing_constructions = count;
    }

    /// Deliver "player cancelled" to the controller's delegate
    ///
    /// Returns false if the controller has no delegate installed.
    pub fn fire_cancelled(&self, view_controller: RawHandle) -> bool {
        match self.capture_cancelled(view_controller) {
            Some(pending) => {
                pending.deliver();
                true
            }
            None => false,
        }
    }

    /// Deliver "did fail with error" to the controller's delegate
    ///
    /// A native error object is created for the call and released afterwards.
    pub fn fire_failed(&self, view_controller: RawHandle, error: &NsError) -> bool {
        let Some((delegate, callbacks)) = self.lock().begin_callback(view_controller) else {
            return false;
        };

        let error_object = self.lock().allocate(ObjectKind::Error(error.clone()));
        (callbacks.0.did_fail_with_error)(callbacks.0.context, delegate, view_controller, error_object);
        self.end_callback(delegate, view_controller);
        if !error_object.is_null() {
            self.release(error_object);
        }
        true
    }

    /// Start a "player cancelled" callback without delivering it yet
    ///
    /// Models an event the native side has already dispatched when the bridge
    /// changes the delegate: the delegate object stays retained until the
    /// returned callback is delivered.
    pub fn capture_cancelled(&self, view_controller: RawHandle) -> Option<PendingCallback<'_>> {
        let (delegate, callbacks) = self.lock().begin_callback(view_controller)?;
        Some(PendingCallback {
            runtime: self,
            delegate,
            view_controller,
            callbacks,
        })
    }

    fn end_callback(&self, delegate: RawHandle, view_controller: RawHandle) {
        self.lock().stats.callbacks_delivered += 1;
        self.release(view_controller);
        self.release(delegate);
    }
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// A delegate callback that has been started but not yet delivered
pub struct PendingCallback<'a> {
    runtime: &'a SimulatedRuntime,
    delegate: RawHandle,
    view_controller: RawHandle,
    callbacks: StoredCallbacks,
}

impl PendingCallback<'_> {
    /// Invoke the captured callback
    pub fn deliver(self) {
        let callbacks = self.callbacks.0;
        (callbacks.was_cancelled)(callbacks.context, self.delegate, self.view_controller);
        self.runtime.end_callback(self.delegate, self.view_controller);
    }
}

impl NativeRuntime for SimulatedRuntime {
    fn name(&self) -> &str {
        "simulated"
    }

    fn retain(&self, object: RawHandle) {
        let mut state = self.lock();
        state.stats.retain_calls += 1;
        match state.objects.get_mut(&(object as usize)) {
            Some(object) => object.ref_count += 1,
            None => state.stats.invalid_accesses += 1,
        }
    }

    fn release(&self, object: RawHandle) {
        // Lock dropped before the context callback runs
        let dead_delegate = self.lock().release(object);
        if let Some(callbacks) = dead_delegate {
            (callbacks.0.release_context)(callbacks.0.context);
            self.lock().stats.contexts_released += 1;
        }
    }

    fn match_request_new(&self) -> RawHandle {
        self.lock().allocate(ObjectKind::MatchRequest {
            min_players: 2,
            max_players: 16,
            invite_message: None,
        })
    }

    fn match_request_min_players(&self, request: RawHandle) -> usize {
        match self.lock().object_mut(request) {
            Some(ObjectKind::MatchRequest { min_players, .. }) => *min_players,
            _ => 0,
        }
    }

    fn match_request_set_min_players(&self, request: RawHandle, value: usize) {
        if let Some(ObjectKind::MatchRequest { min_players, .. }) = self.lock().object_mut(request) {
            *min_players = value;
        }
    }

    fn match_request_max_players(&self, request: RawHandle) -> usize {
        match self.lock().object_mut(request) {
            Some(ObjectKind::MatchRequest { max_players, .. }) => *max_players,
            _ => 0,
        }
    }

    fn match_request_set_max_players(&self, request: RawHandle, value: usize) {
        if let Some(ObjectKind::MatchRequest { max_players, .. }) = self.lock().object_mut(request) {
            *max_players = value;
        }
    }

    fn match_request_invite_message(&self, request: RawHandle) -> Option<String> {
        let message = match self.lock().object_mut(request) {
            Some(ObjectKind::MatchRequest { invite_message, .. }) => invite_message.clone(),
            _ => None,
        };
        // Round-trip through the buffer convention like a real backend
        crate::runtime::read_native_string(|buffer, size| write_native_string(message.as_deref(), buffer, size))
    }

    fn match_request_set_invite_message(&self, request: RawHandle, message: Option<&CStr>) {
        if let Some(ObjectKind::MatchRequest { invite_message, .. }) = self.lock().object_mut(request) {
            *invite_message = message.map(|m| m.to_string_lossy().into_owned());
        }
    }

    fn matchmaker_init_with_match_request(&self, request: RawHandle) -> RawHandle {
        let mut state = self.lock();
        if !request.is_null() && !state.objects.contains_key(&(request as usize)) {
            state.stats.invalid_accesses += 1;
            return std::ptr::null_mut();
        }
        state.allocate(ObjectKind::ViewController {
            show_existing_matches: true,
            delegate: 0,
        })
    }

    fn matchmaker_show_existing_matches(&self, view_controller: RawHandle) -> bool {
        matches!(
            self.lock().object_mut(view_controller),
            Some(ObjectKind::ViewController { show_existing_matches: true, .. })
        )
    }

    fn matchmaker_set_show_existing_matches(&self, view_controller: RawHandle, value: bool) {
        if let Some(ObjectKind::ViewController { show_existing_matches, .. }) = self.lock().object_mut(view_controller) {
            *show_existing_matches = value;
        }
    }

    fn matchmaker_delegate(&self, view_controller: RawHandle) -> RawHandle {
        match self.lock().object_mut(view_controller) {
            Some(ObjectKind::ViewController { delegate, .. }) => *delegate as RawHandle,
            _ => std::ptr::null_mut(),
        }
    }

    fn matchmaker_set_delegate(&self, view_controller: RawHandle, new_delegate: RawHandle) {
        let mut state = self.lock();
        if !new_delegate.is_null() {
            state.stats.delegate_assignments += 1;
        }
        if let Some(ObjectKind::ViewController { delegate, .. }) = state.object_mut(view_controller) {
            *delegate = new_delegate as usize;
        }
    }

    fn matchmaker_delegate_new(&self, callbacks: DelegateCallbacks) -> RawHandle {
        let mut state = self.lock();
        let raw = state.allocate(ObjectKind::Delegate(StoredCallbacks(callbacks)));
        if !raw.is_null() {
            state.stats.delegates_created += 1;
        }
        raw
    }

    fn error_code(&self, error: RawHandle) -> i64 {
        match self.lock().object_mut(error) {
            Some(ObjectKind::Error(error)) => error.code,
            _ => 0,
        }
    }

    fn error_domain(&self, error: RawHandle) -> Option<String> {
        match self.lock().object_mut(error) {
            Some(ObjectKind::Error(error)) => Some(error.domain.clone()),
            _ => None,
        }
    }

    fn error_localized_description(&self, error: RawHandle) -> Option<String> {
        match self.lock().object_mut(error) {
            Some(ObjectKind::Error(error)) => error.localized_description.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_void;

    extern "C" fn ignore_cancel(_context: *mut c_void, _delegate: RawHandle, _vc: RawHandle) {}
    extern "C" fn ignore_failure(_context: *mut c_void, _delegate: RawHandle, _vc: RawHandle, _error: RawHandle) {}
    extern "C" fn ignore_release(_context: *mut c_void) {}

    fn noop_callbacks() -> DelegateCallbacks {
        DelegateCallbacks {
            context: std::ptr::null_mut(),
            was_cancelled: ignore_cancel,
            did_fail_with_error: ignore_failure,
            release_context: ignore_release,
        }
    }

    #[test]
    fn test_reference_counting() {
        let sim = SimulatedRuntime::new();
        let request = sim.match_request_new();

        sim.retain(request);
        assert_eq!(sim.ref_count(request), Some(2));
        sim.release(request);
        sim.release(request);
        assert_eq!(sim.ref_count(request), None);

        sim.release(request);
        let stats = sim.stats();
        assert_eq!(stats.deallocated, 1);
        assert_eq!(stats.over_releases, 1);
    }

    #[test]
    fn test_delegate_slot_is_zeroing_weak() {
        let sim = SimulatedRuntime::new();
        let vc = sim.matchmaker_init_with_match_request(std::ptr::null_mut());
        let delegate = sim.matchmaker_delegate_new(noop_callbacks());

        sim.matchmaker_set_delegate(vc, delegate);
        assert_eq!(sim.matchmaker_delegate(vc), delegate);

        sim.release(delegate);
        assert!(sim.matchmaker_delegate(vc).is_null());
        assert_eq!(sim.stats().contexts_released, 1);
        assert!(!sim.fire_cancelled(vc));
    }

    #[test]
    fn test_fire_without_delegate() {
        let sim = SimulatedRuntime::new();
        let vc = sim.matchmaker_init_with_match_request(std::ptr::null_mut());

        assert!(!sim.fire_cancelled(vc));
        assert!(!sim.fire_failed(vc, &NsError::new("GKErrorDomain", 3)));
        assert_eq!(sim.stats().callbacks_delivered, 0);
    }

    #[test]
    fn test_callback_balances_references() {
        let sim = SimulatedRuntime::new();
        let vc = sim.matchmaker_init_with_match_request(std::ptr::null_mut());
        let delegate = sim.matchmaker_delegate_new(noop_callbacks());
        sim.matchmaker_set_delegate(vc, delegate);

        assert!(sim.fire_cancelled(vc));
        assert!(sim.fire_failed(vc, &NsError::new("GKErrorDomain", 3)));

        assert_eq!(sim.ref_count(vc), Some(1));
        assert_eq!(sim.ref_count(delegate), Some(1));
        assert_eq!(sim.stats().callbacks_delivered, 2);
        // Error objects are created and destroyed per callback
        assert_eq!(sim.live_objects(), 2);
    }

    #[test]
    fn test_init_with_dead_request_fails() {
        let sim = SimulatedRuntime::new();
        let request = sim.match_request_new();
        sim.release(request);

        assert!(sim.matchmaker_init_with_match_request(request).is_null());
    }

    #[test]
    fn test_failing_constructions() {
        let sim = SimulatedRuntime::new();
        sim.fail_next_constructions(2);

        assert!(sim.match_request_new().is_null());
        assert!(sim.matchmaker_init_with_match_request(std::ptr::null_mut()).is_null());
        assert!(!sim.match_request_new().is_null());
        assert_eq!(sim.stats().constructed, 1);
    }
}
