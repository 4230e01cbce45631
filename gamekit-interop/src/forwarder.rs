//! Delegate forwarder for the turn-based matchmaker
//!
//! The forwarder is the only Rust object the native runtime ever references.
//! It owns a native delegate object whose callbacks land in the `extern "C"`
//! trampolines below; the trampolines find the forwarder again through the
//! [`InteropObjectFactory`] and hand the event to whatever listener is stored
//! at that moment.
//!
//! Every missing link on the way (factory gone, forwarder unregistered,
//! listener cleared or dropped) turns the callback into a no-op: the native
//! side may deliver an event after the listener was removed, and that is not
//! an error.

use crate::bridge::Bridge;
use crate::handle::NativeHandle;
use crate::matchmaker::{TurnBasedMatchmakerDelegate, TurnBasedMatchmakerViewController};
use crate::registry::InteropObjectFactory;
use crate::runtime::{DelegateCallbacks, NativeRuntime};
use crate::types::{InteropError, NsError, RawHandle, Result};
use std::ffi::c_void;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock, Weak};

/// Registry of live matchmaker delegate forwarders, keyed by view controller
pub type DelegateFactory = InteropObjectFactory<MatchmakerDelegateForwarder>;

type Listener = dyn TurnBasedMatchmakerDelegate;

/// Native callback target that relays matchmaker events to a listener
pub struct MatchmakerDelegateForwarder {
    handle: NativeHandle,
    listener: RwLock<Option<Weak<Listener>>>,
}

impl MatchmakerDelegateForwarder {
    const TYPE_NAME: &'static str = "MatchmakerDelegateForwarder";

    /// Create the native delegate object wired to this module's trampolines
    ///
    /// The callback context is a boxed weak reference to `factory`; the native
    /// object frees it through `release_context` when it deallocates.
    pub(crate) fn create(runtime: Arc<dyn NativeRuntime>, factory: &Arc<DelegateFactory>) -> Result<Self> {
        let context = Box::into_raw(Box::new(Arc::downgrade(factory))).cast::<c_void>();

        let raw = runtime.matchmaker_delegate_new(DelegateCallbacks {
            context,
            was_cancelled: was_cancelled_trampoline,
            did_fail_with_error: did_fail_with_error_trampoline,
            release_context: release_context_trampoline,
        });

        if raw.is_null() {
            // The native side never took ownership of the context
            release_context_trampoline(context);
            return Err(InteropError::InvalidHandle(Self::TYPE_NAME));
        }

        log::debug!("Created native matchmaker delegate 0x{:X}", raw as usize);

        Ok(Self {
            handle: NativeHandle::adopt(runtime, raw),
            listener: RwLock::new(None),
        })
    }

    /// Handle to pass to the native delegate slot
    pub fn raw(&self) -> Result<RawHandle> {
        self.handle.as_raw(Self::TYPE_NAME)
    }

    /// Identity of the native delegate object
    pub fn native_id(&self) -> usize {
        self.handle.id()
    }

    /// Replace the stored listener; `None` turns every later callback into a no-op
    pub fn set_listener(&self, listener: Option<&Arc<Listener>>) {
        let mut slot = self.listener.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = listener.map(Arc::downgrade);
    }

    /// The current listener, if one is set and still alive
    pub fn listener(&self) -> Option<Arc<Listener>> {
        let slot = self.listener.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.as_ref().and_then(Weak::upgrade)
    }

    fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        self.handle.runtime()
    }
}

impl fmt::Debug for MatchmakerDelegateForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchmakerDelegateForwarder")
            .field("handle", &self.handle)
            .field("has_listener", &self.listener().is_some())
            .finish()
    }
}

/// Copy a native `NSError*` into a local value
pub(crate) fn translate_error(runtime: &dyn NativeRuntime, error: RawHandle) -> NsError {
    if error.is_null() {
        return NsError::new(String::new(), 0);
    }

    NsError {
        domain: runtime.error_domain(error).unwrap_or_default(),
        code: runtime.error_code(error),
        localized_description: runtime.error_localized_description(error),
    }
}

/// Shared path of every trampoline: resolve, then dispatch without unwinding
fn forward<F>(context: *mut c_void, delegate: RawHandle, view_controller: RawHandle, event: &str, dispatch: F)
where
    F: FnOnce(&Bridge, &Listener, &TurnBasedMatchmakerViewController),
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if context.is_null() {
            return;
        }

        // SAFETY: `context` is the box created in `create`, which stays alive
        // until the native delegate object calls `release_context`
        let factory = unsafe { &*context.cast::<Weak<DelegateFactory>>() };
        let Some(factory) = factory.upgrade() else {
            log::warn!("Dropping {} callback: bridge already torn down", event);
            return;
        };

        let Some(forwarder) = factory.find_by_native(delegate as usize) else {
            log::trace!("Dropping {} callback for unregistered delegate 0x{:X}", event, delegate as usize);
            return;
        };

        let Some(listener) = forwarder.listener() else {
            log::trace!("Dropping {} callback: no listener", event);
            return;
        };

        log::trace!("Dispatching {} for view controller 0x{:X}", event, view_controller as usize);

        let bridge = Bridge::from_parts(Arc::clone(forwarder.runtime()), factory);
        let view_controller = TurnBasedMatchmakerViewController::from_borrowed(&bridge, view_controller);
        dispatch(&bridge, listener.as_ref(), &view_controller);
    }));

    if outcome.is_err() {
        log::error!("Matchmaker delegate panicked while handling {}", event);
    }
}

extern "C" fn was_cancelled_trampoline(context: *mut c_void, delegate: RawHandle, view_controller: RawHandle) {
    forward(context, delegate, view_controller, "was_cancelled", |_, listener, vc| {
        listener.was_cancelled(vc);
    });
}

extern "C" fn did_fail_with_error_trampoline(
    context: *mut c_void,
    delegate: RawHandle,
    view_controller: RawHandle,
    error: RawHandle,
) {
    forward(context, delegate, view_controller, "did_fail_with_error", |bridge, listener, vc| {
        let error = translate_error(bridge.runtime().as_ref(), error);
        listener.did_fail_with_error(vc, error);
    });
}

extern "C" fn release_context_trampoline(context: *mut c_void) {
    if context.is_null() {
        return;
    }
    // SAFETY: called once per context, after which the native side forgets it
    drop(unsafe { Box::from_raw(context.cast::<Weak<DelegateFactory>>()) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatedRuntime;

    struct Silent;

    impl TurnBasedMatchmakerDelegate for Silent {
        fn was_cancelled(&self, _view_controller: &TurnBasedMatchmakerViewController) {}
        fn did_fail_with_error(&self, _view_controller: &TurnBasedMatchmakerViewController, _error: NsError) {}
    }

    #[test]
    fn test_listener_is_weak() {
        let sim = Arc::new(SimulatedRuntime::new());
        let factory = Arc::new(DelegateFactory::new());
        let forwarder = MatchmakerDelegateForwarder::create(sim.clone(), &factory).unwrap();

        let listener: Arc<Listener> = Arc::new(Silent);
        forwarder.set_listener(Some(&listener));
        assert!(forwarder.listener().is_some());

        drop(listener);
        assert!(forwarder.listener().is_none());
    }

    #[test]
    fn test_context_freed_with_native_object() {
        let sim = Arc::new(SimulatedRuntime::new());
        let factory = Arc::new(DelegateFactory::new());
        let forwarder = MatchmakerDelegateForwarder::create(sim.clone(), &factory).unwrap();

        // The boxed context only holds a weak reference
        assert_eq!(Arc::weak_count(&factory), 1);
        drop(forwarder);
        assert_eq!(Arc::weak_count(&factory), 0);
        assert_eq!(sim.stats().contexts_released, 1);
    }

    #[test]
    fn test_failed_native_creation() {
        let sim = Arc::new(SimulatedRuntime::new());
        sim.fail_next_constructions(1);
        let factory = Arc::new(DelegateFactory::new());

        let result = MatchmakerDelegateForwarder::create(sim.clone(), &factory);
        assert!(matches!(result, Err(InteropError::InvalidHandle(_))));
        assert_eq!(Arc::weak_count(&factory), 0);
    }

    #[test]
    fn test_translate_null_error() {
        let sim = SimulatedRuntime::new();
        let error = translate_error(&sim, std::ptr::null_mut());
        assert_eq!(error.code, 0);
        assert!(error.domain.is_empty());
    }
}
