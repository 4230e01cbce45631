//! GameKit Interop Library
//!
//! Rust bindings for the native GameKit turn-based matchmaker, built around a
//! small, reusable FFI pattern for callback-based native objects.
//!
//! # Architecture
//!
//! - [`NativeHandle`]: one counted reference to a native object, released
//!   exactly once
//! - Proxies ([`TurnBasedMatchmakerViewController`], [`MatchRequest`]): typed
//!   accessors that become native calls with the proxy's handle first
//! - [`MatchmakerDelegateForwarder`]: the object the native side calls back
//!   into; it relays events to a [`TurnBasedMatchmakerDelegate`]
//! - [`InteropObjectFactory`]: per-bridge registry keeping at most one
//!   forwarder per native controller
//! - [`NativeRuntime`]: the native ABI, implemented by a dynamically loaded
//!   library, by link-time symbols on iOS, or by the in-process
//!   [`simulator`]
//!
//! Errors the native side reports asynchronously (matchmaking failures) go to
//! the delegate; [`InteropError`] only covers misuse of the bridge itself.
//!
//! # Example Usage
//!
//! ```no_run
//! use gamekit_interop::{
//!     Bridge, BridgeConfig, MatchRequest, NsError, TurnBasedMatchmakerDelegate,
//!     TurnBasedMatchmakerViewController,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! struct Listener;
//!
//! impl TurnBasedMatchmakerDelegate for Listener {
//!     fn was_cancelled(&self, _vc: &TurnBasedMatchmakerViewController) {
//!         println!("Matchmaking cancelled");
//!     }
//!
//!     fn did_fail_with_error(&self, _vc: &TurnBasedMatchmakerViewController, error: NsError) {
//!         eprintln!("Matchmaking failed: {}", error);
//!     }
//! }
//!
//! let config = BridgeConfig::new().with_library(Path::new("libgamekit_bridge.dylib"));
//! let bridge = Bridge::from_config(&config).unwrap();
//!
//! let request = MatchRequest::new(&bridge);
//! request.set_max_players(4).unwrap();
//!
//! let view_controller = TurnBasedMatchmakerViewController::new(&bridge, Some(&request)).unwrap();
//! let listener: Arc<dyn TurnBasedMatchmakerDelegate> = Arc::new(Listener);
//! view_controller.set_delegate(Some(listener.clone())).unwrap();
//!
//! // ... present the controller, receive events ...
//!
//! view_controller.dispose().unwrap();
//! ```

// Public modules
pub mod bridge;
pub mod config;
pub mod forwarder;
pub mod handle;
pub mod match_request;
pub mod matchmaker;
pub mod registry;
pub mod runtime;
pub mod simulator;
pub mod types;

// Re-export main types for convenience
pub use bridge::Bridge;
pub use config::{BackendKind, BridgeConfig};
pub use forwarder::{DelegateFactory, MatchmakerDelegateForwarder};
pub use handle::NativeHandle;
pub use match_request::MatchRequest;
pub use matchmaker::{TurnBasedMatchmakerDelegate, TurnBasedMatchmakerViewController};
pub use registry::InteropObjectFactory;
pub use runtime::{DynamicRuntime, NativeRuntime, SymbolStatus, REQUIRED_SYMBOLS};
pub use types::{InteropError, NsError, RawHandle, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
