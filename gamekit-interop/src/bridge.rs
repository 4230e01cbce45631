//! Bridge wiring
//!
//! A [`Bridge`] pairs one native runtime with the forwarder registry that
//! belongs to it. Every proxy is built from a bridge, and cloning one only
//! clones two `Arc`s.

use crate::config::{BackendKind, BridgeConfig};
use crate::forwarder::DelegateFactory;
use crate::runtime::{DynamicRuntime, NativeRuntime};
use crate::simulator::SimulatedRuntime;
use crate::types::{InteropError, Result};
use std::fmt;
use std::sync::Arc;

/// Native runtime plus its delegate registry
#[derive(Clone)]
pub struct Bridge {
    runtime: Arc<dyn NativeRuntime>,
    delegates: Arc<DelegateFactory>,
}

impl Bridge {
    /// Create a bridge with a fresh, empty delegate registry
    pub fn new(runtime: Arc<dyn NativeRuntime>) -> Self {
        Self::from_parts(runtime, Arc::new(DelegateFactory::new()))
    }

    pub(crate) fn from_parts(runtime: Arc<dyn NativeRuntime>, delegates: Arc<DelegateFactory>) -> Self {
        Self { runtime, delegates }
    }

    /// Create a bridge for the backend selected in `config`
    ///
    /// # Example
    /// ```no_run
    /// use gamekit_interop::{Bridge, BridgeConfig};
    /// use std::path::Path;
    ///
    /// let config = BridgeConfig::new().with_library(Path::new("libgamekit_bridge.dylib"));
    /// let bridge = Bridge::from_config(&config).unwrap();
    /// ```
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;

        let runtime: Arc<dyn NativeRuntime> = match config.backend {
            BackendKind::Simulated => Arc::new(SimulatedRuntime::new()),
            BackendKind::Dynamic => {
                let path = config.library.as_deref().ok_or_else(|| {
                    InteropError::Config("dynamic backend requires a library path".to_string())
                })?;
                Arc::new(DynamicRuntime::open(path)?)
            }
            BackendKind::Linked => linked_runtime()?,
        };

        log::info!("Bridge created with {} backend", runtime.name());
        Ok(Self::new(runtime))
    }

    /// The native runtime every call goes through
    pub fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        &self.runtime
    }

    /// Registry of live delegate forwarders
    pub fn delegates(&self) -> &Arc<DelegateFactory> {
        &self.delegates
    }
}

#[cfg(target_os = "ios")]
fn linked_runtime() -> Result<Arc<dyn NativeRuntime>> {
    Ok(Arc::new(crate::runtime::LinkedRuntime::new()))
}

#[cfg(not(target_os = "ios"))]
fn linked_runtime() -> Result<Arc<dyn NativeRuntime>> {
    Err(InteropError::Config(
        "linked backend is only available on iOS".to_string(),
    ))
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("runtime", &self.runtime.name())
            .field("live_delegates", &self.delegates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_from_config() {
        let bridge = Bridge::from_config(&BridgeConfig::new()).unwrap();
        assert_eq!(bridge.runtime().name(), "simulated");
        assert!(bridge.delegates().is_empty());
    }

    #[test]
    fn test_dynamic_without_library_rejected() {
        let config = BridgeConfig::new().with_backend(BackendKind::Dynamic);
        assert!(matches!(Bridge::from_config(&config), Err(InteropError::Config(_))));
    }

    #[test]
    fn test_clones_share_registry() {
        let bridge = Bridge::new(Arc::new(SimulatedRuntime::new()));
        let clone = bridge.clone();
        assert!(Arc::ptr_eq(bridge.delegates(), clone.delegates()));
    }

    #[cfg(not(target_os = "ios"))]
    #[test]
    fn test_linked_unavailable_off_ios() {
        let config = BridgeConfig::new().with_backend(BackendKind::Linked);
        assert!(Bridge::from_config(&config).is_err());
    }
}
