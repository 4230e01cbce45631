//! Turn-based matchmaker view controller
//!
//! [`TurnBasedMatchmakerViewController`] mirrors the native
//! `GKTurnBasedMatchmakerViewController`: properties become native accessor
//! calls with the controller handle first, and the delegate property is backed
//! by a [`MatchmakerDelegateForwarder`] created on first assignment.

use crate::bridge::Bridge;
use crate::forwarder::MatchmakerDelegateForwarder;
use crate::handle::NativeHandle;
use crate::match_request::MatchRequest;
use crate::types::{NsError, RawHandle, Result};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Receives the events raised by a matchmaker view controller
///
/// Methods may be called on any thread, at any time after the delegate was
/// assigned. The `view_controller` argument wraps the controller that raised
/// the event; compare [`TurnBasedMatchmakerViewController::id`] to tell
/// controllers apart.
pub trait TurnBasedMatchmakerDelegate: Send + Sync {
    /// The player cancelled matchmaking
    fn was_cancelled(&self, view_controller: &TurnBasedMatchmakerViewController);

    /// Matchmaking failed
    fn did_fail_with_error(&self, view_controller: &TurnBasedMatchmakerViewController, error: NsError);
}

#[derive(Default)]
struct DelegateState {
    delegate: Option<Arc<dyn TurnBasedMatchmakerDelegate>>,
    forwarder: Option<Arc<MatchmakerDelegateForwarder>>,
}

/// Proxy for a native `GKTurnBasedMatchmakerViewController`
pub struct TurnBasedMatchmakerViewController {
    bridge: Bridge,
    handle: NativeHandle,
    state: Mutex<DelegateState>,
    // Built by `new`; unregisters the controller's delegate when dropped
    owner: bool,
}

impl TurnBasedMatchmakerViewController {
    const TYPE_NAME: &'static str = "TurnBasedMatchmakerViewController";

    /// Initialise a new native view controller for `request`
    ///
    /// A `request` that is itself invalid (failed allocation or disposed) is
    /// rejected with [`crate::InteropError::InvalidHandle`]; only `None` is
    /// passed to the native side as a null request.
    ///
    /// If the native initializer returns null the proxy is still returned, but
    /// every accessor fails with [`crate::InteropError::InvalidHandle`]; check
    /// [`is_valid`](Self::is_valid) before presenting it.
    ///
    /// # Example
    /// ```no_run
    /// use gamekit_interop::{Bridge, MatchRequest, TurnBasedMatchmakerViewController};
    /// use gamekit_interop::simulator::SimulatedRuntime;
    /// use std::sync::Arc;
    ///
    /// let bridge = Bridge::new(Arc::new(SimulatedRuntime::new()));
    /// let request = MatchRequest::new(&bridge);
    /// let view_controller = TurnBasedMatchmakerViewController::new(&bridge, Some(&request)).unwrap();
    /// view_controller.set_show_existing_matches(false).unwrap();
    /// ```
    pub fn new(bridge: &Bridge, request: Option<&MatchRequest>) -> Result<Self> {
        let request_ptr = match request {
            Some(request) => request.raw()?,
            None => std::ptr::null_mut(),
        };

        let raw = bridge.runtime().matchmaker_init_with_match_request(request_ptr);
        if raw.is_null() {
            log::warn!("Native matchmaker view controller initialisation returned null");
        }

        let handle = NativeHandle::adopt(Arc::clone(bridge.runtime()), raw);
        Ok(Self::with_handle(bridge, handle, true))
    }

    /// Wrap a controller handle supplied by the native side
    ///
    /// The handle is retained for the proxy's lifetime.
    pub fn from_borrowed(bridge: &Bridge, raw: RawHandle) -> Self {
        Self::with_handle(bridge, NativeHandle::retain(Arc::clone(bridge.runtime()), raw), false)
    }

    fn with_handle(bridge: &Bridge, handle: NativeHandle, owner: bool) -> Self {
        Self {
            bridge: bridge.clone(),
            handle,
            state: Mutex::new(DelegateState::default()),
            owner,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DelegateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn this(&self) -> Result<RawHandle> {
        self.handle.as_raw(Self::TYPE_NAME)
    }

    /// False if native initialisation failed or the proxy was disposed
    pub fn is_valid(&self) -> bool {
        self.this().is_ok()
    }

    /// Identity of the native controller
    pub fn id(&self) -> usize {
        self.handle.id()
    }

    /// The native handle backing this proxy
    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    /// Whether the controller lists matches the player already takes part in
    pub fn show_existing_matches(&self) -> Result<bool> {
        let this = self.this()?;
        Ok(self.bridge.runtime().matchmaker_show_existing_matches(this))
    }

    pub fn set_show_existing_matches(&self, value: bool) -> Result<()> {
        let this = self.this()?;
        self.bridge.runtime().matchmaker_set_show_existing_matches(this, value);
        Ok(())
    }

    /// The object currently in the native delegate slot (null if none)
    pub fn native_delegate(&self) -> Result<RawHandle> {
        let this = self.this()?;
        Ok(self.bridge.runtime().matchmaker_delegate(this))
    }

    /// The delegate assigned to this controller
    ///
    /// Proxies created around a borrowed handle (such as the one passed to a
    /// delegate callback) report the delegate registered for the native
    /// controller by whichever proxy assigned it.
    pub fn delegate(&self) -> Option<Arc<dyn TurnBasedMatchmakerDelegate>> {
        if let Some(delegate) = self.lock_state().delegate.clone() {
            return Some(delegate);
        }
        self.bridge
            .delegates()
            .get(self.id())
            .and_then(|forwarder| forwarder.listener())
    }

    /// Assign or clear the delegate
    ///
    /// - The first assignment creates a forwarder and installs it in the native
    ///   delegate slot.
    /// - Later assignments only swap the listener the forwarder calls; the
    ///   native side is not touched. Prefer changing the behaviour of an
    ///   existing delegate over replacing it.
    /// - `None` clears the native slot and discards the forwarder, so the next
    ///   assignment creates a new one.
    pub fn set_delegate(&self, delegate: Option<Arc<dyn TurnBasedMatchmakerDelegate>>) -> Result<()> {
        let this = self.this()?;
        let mut state = self.lock_state();

        match delegate {
            None => self.clear_delegate(this, &mut state),
            Some(delegate) => {
                // Another proxy for the same controller may have cleared it
                let current = state
                    .forwarder
                    .as_ref()
                    .filter(|forwarder| self.is_registered(forwarder))
                    .cloned();

                let forwarder = match current {
                    Some(forwarder) => forwarder,
                    None => {
                        let forwarder = self.install_forwarder(this)?;
                        state.forwarder = Some(Arc::clone(&forwarder));
                        forwarder
                    }
                };

                forwarder.set_listener(Some(&delegate));
                state.delegate = Some(delegate);
            }
        }

        Ok(())
    }

    /// Unregister the forwarder and empty the native delegate slot
    fn clear_delegate(&self, this: RawHandle, state: &mut DelegateState) {
        // Silence in-flight callbacks before the native side lets go
        let local = state.forwarder.take();
        if let Some(forwarder) = &local {
            forwarder.set_listener(None);
        }
        let registered = self.bridge.delegates().remove(self.id());
        if let Some(forwarder) = &registered {
            forwarder.set_listener(None);
        }

        self.bridge.runtime().matchmaker_set_delegate(this, std::ptr::null_mut());
        state.delegate = None;

        if local.is_some() || registered.is_some() {
            log::debug!("Cleared delegate of matchmaker 0x{:X}", self.id());
        }
    }

    fn is_registered(&self, forwarder: &Arc<MatchmakerDelegateForwarder>) -> bool {
        self.bridge
            .delegates()
            .get(self.id())
            .is_some_and(|registered| Arc::ptr_eq(&registered, forwarder))
    }

    fn install_forwarder(&self, this: RawHandle) -> Result<Arc<MatchmakerDelegateForwarder>> {
        let runtime = Arc::clone(self.bridge.runtime());
        let factory = Arc::clone(self.bridge.delegates());

        let mut created = false;
        let forwarder = self.bridge.delegates().get_or_create(
            self.id(),
            || {
                created = true;
                MatchmakerDelegateForwarder::create(runtime, &factory)
            },
            MatchmakerDelegateForwarder::native_id,
        )?;

        // A registered forwarder is already in the native slot
        if created {
            self.bridge.runtime().matchmaker_set_delegate(this, forwarder.raw()?);
            log::debug!(
                "Installed delegate 0x{:X} on matchmaker 0x{:X}",
                forwarder.native_id(),
                self.id()
            );
        }

        Ok(forwarder)
    }

    /// Clear the delegate and release the native controller
    ///
    /// Dropping a proxy built by [`new`](Self::new) does the same. Dropping a
    /// proxy built by [`from_borrowed`](Self::from_borrowed) only releases its
    /// reference; the delegate stays with the controller's owner.
    pub fn dispose(self) -> Result<()> {
        if self.is_valid() {
            self.set_delegate(None)?;
        }
        self.handle.release();
        Ok(())
    }
}

impl Drop for TurnBasedMatchmakerViewController {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        if let Ok(this) = self.this() {
            let mut state = self.lock_state();
            self.clear_delegate(this, &mut state);
        }
    }
}

impl fmt::Debug for TurnBasedMatchmakerViewController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnBasedMatchmakerViewController")
            .field("handle", &self.handle)
            .field("has_forwarder", &self.lock_state().forwarder.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatedRuntime;
    use crate::types::InteropError;

    struct Silent;

    impl TurnBasedMatchmakerDelegate for Silent {
        fn was_cancelled(&self, _view_controller: &TurnBasedMatchmakerViewController) {}
        fn did_fail_with_error(&self, _view_controller: &TurnBasedMatchmakerViewController, _error: NsError) {}
    }

    fn setup() -> (Arc<SimulatedRuntime>, Bridge) {
        let sim = Arc::new(SimulatedRuntime::new());
        let bridge = Bridge::new(sim.clone());
        (sim, bridge)
    }

    #[test]
    fn test_show_existing_matches_round_trip() {
        let (_sim, bridge) = setup();
        let vc = TurnBasedMatchmakerViewController::new(&bridge, None).unwrap();

        assert!(vc.show_existing_matches().unwrap());
        vc.set_show_existing_matches(false).unwrap();
        assert!(!vc.show_existing_matches().unwrap());
    }

    #[test]
    fn test_null_construction_fails_every_accessor() {
        let (sim, bridge) = setup();
        sim.fail_next_constructions(1);
        let vc = TurnBasedMatchmakerViewController::new(&bridge, None).unwrap();

        assert!(!vc.is_valid());
        assert!(matches!(vc.show_existing_matches(), Err(InteropError::InvalidHandle(_))));
        assert!(matches!(vc.set_show_existing_matches(true), Err(InteropError::InvalidHandle(_))));
        assert!(matches!(vc.native_delegate(), Err(InteropError::InvalidHandle(_))));
        assert!(matches!(vc.set_delegate(Some(Arc::new(Silent))), Err(InteropError::InvalidHandle(_))));
        assert!(matches!(vc.set_delegate(None), Err(InteropError::InvalidHandle(_))));
        assert!(vc.dispose().is_ok());
        assert_eq!(sim.stats().release_calls, 0);
    }

    #[test]
    fn test_replacing_delegate_keeps_forwarder() {
        let (sim, bridge) = setup();
        let vc = TurnBasedMatchmakerViewController::new(&bridge, None).unwrap();

        vc.set_delegate(Some(Arc::new(Silent))).unwrap();
        let installed = vc.native_delegate().unwrap();
        vc.set_delegate(Some(Arc::new(Silent))).unwrap();

        assert_eq!(vc.native_delegate().unwrap(), installed);
        assert_eq!(sim.stats().delegates_created, 1);
        assert_eq!(sim.stats().delegate_assignments, 1);
    }

    #[test]
    fn test_clearing_delegate_nils_native_slot() {
        let (_sim, bridge) = setup();
        let vc = TurnBasedMatchmakerViewController::new(&bridge, None).unwrap();

        vc.set_delegate(Some(Arc::new(Silent))).unwrap();
        assert!(!vc.native_delegate().unwrap().is_null());
        assert_eq!(bridge.delegates().len(), 1);

        vc.set_delegate(None).unwrap();
        assert!(vc.native_delegate().unwrap().is_null());
        assert!(vc.delegate().is_none());
        assert!(bridge.delegates().is_empty());
    }

    #[test]
    fn test_borrowed_proxy_sees_registered_delegate() {
        let (_sim, bridge) = setup();
        let vc = TurnBasedMatchmakerViewController::new(&bridge, None).unwrap();
        let listener: Arc<dyn TurnBasedMatchmakerDelegate> = Arc::new(Silent);
        vc.set_delegate(Some(Arc::clone(&listener))).unwrap();

        let borrowed = TurnBasedMatchmakerViewController::from_borrowed(&bridge, vc.this().unwrap());
        let seen = borrowed.delegate().unwrap();
        assert!(Arc::ptr_eq(&seen, &listener));
    }

    #[test]
    fn test_borrowed_assignment_reuses_installed_forwarder() {
        let (sim, bridge) = setup();
        let vc = TurnBasedMatchmakerViewController::new(&bridge, None).unwrap();
        vc.set_delegate(Some(Arc::new(Silent))).unwrap();
        let installed = vc.native_delegate().unwrap();

        let borrowed = TurnBasedMatchmakerViewController::from_borrowed(&bridge, vc.this().unwrap());
        borrowed.set_delegate(Some(Arc::new(Silent))).unwrap();

        assert_eq!(vc.native_delegate().unwrap(), installed);
        assert_eq!(sim.stats().delegates_created, 1);
        assert_eq!(sim.stats().delegate_assignments, 1);
        assert_eq!(bridge.delegates().len(), 1);
    }

    #[test]
    fn test_invalid_request_rejected() {
        let (sim, bridge) = setup();
        sim.fail_next_constructions(1);
        let request = MatchRequest::new(&bridge);

        let result = TurnBasedMatchmakerViewController::new(&bridge, Some(&request));
        assert!(matches!(result, Err(InteropError::InvalidHandle("MatchRequest"))));
        assert_eq!(sim.stats().constructed, 0);
    }

    #[test]
    fn test_drop_unregisters_delegate() {
        let (sim, bridge) = setup();
        let vc = TurnBasedMatchmakerViewController::new(&bridge, None).unwrap();
        vc.set_delegate(Some(Arc::new(Silent))).unwrap();
        assert_eq!(bridge.delegates().len(), 1);

        drop(vc);

        assert!(bridge.delegates().is_empty());
        assert_eq!(sim.live_objects(), 0);
        assert_eq!(sim.stats().contexts_released, 1);
    }

    #[test]
    fn test_dropping_borrowed_proxy_keeps_owner_delegate() {
        let (_sim, bridge) = setup();
        let vc = TurnBasedMatchmakerViewController::new(&bridge, None).unwrap();
        let listener: Arc<dyn TurnBasedMatchmakerDelegate> = Arc::new(Silent);
        vc.set_delegate(Some(Arc::clone(&listener))).unwrap();

        drop(TurnBasedMatchmakerViewController::from_borrowed(&bridge, vc.this().unwrap()));

        assert_eq!(bridge.delegates().len(), 1);
        assert!(!vc.native_delegate().unwrap().is_null());
    }

    #[test]
    fn test_dispose_releases_everything() {
        let (sim, bridge) = setup();
        let vc = TurnBasedMatchmakerViewController::new(&bridge, None).unwrap();
        vc.set_delegate(Some(Arc::new(Silent))).unwrap();

        vc.dispose().unwrap();

        assert!(bridge.delegates().is_empty());
        assert_eq!(sim.live_objects(), 0);
        assert_eq!(sim.stats().over_releases, 0);
    }
}
