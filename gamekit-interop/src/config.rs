//! Bridge configuration types
//!
//! The library only needs to know which native backend to talk to. Anything
//! about what to do with the bridge (which properties to set, which events to
//! expect) belongs to the application layer.

use crate::types::{InteropError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which implementation of the native ABI to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process simulator, no native code involved
    #[default]
    Simulated,
    /// Shared library loaded at runtime
    Dynamic,
    /// Symbols linked into the app binary (iOS only)
    Linked,
}

/// Configuration for building a [`crate::Bridge`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Backend to use (default: simulated)
    #[serde(default)]
    pub backend: BackendKind,

    /// Path of the native bridge library for the dynamic backend
    #[serde(default)]
    pub library: Option<PathBuf>,
}

impl BridgeConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: select a backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Builder method: load the native bridge from `path` (selects the dynamic backend)
    pub fn with_library(mut self, path: &Path) -> Self {
        self.backend = BackendKind::Dynamic;
        self.library = Some(path.to_path_buf());
        self
    }

    /// Check that the selected backend has what it needs
    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Dynamic && self.library.is_none() {
            return Err(InteropError::Config(
                "dynamic backend requires a library path".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_config_builder() {
        let config = BridgeConfig::new().with_library(Path::new("libgamekit_bridge.dylib"));

        assert_eq!(config.backend, BackendKind::Dynamic);
        assert_eq!(config.library, Some(PathBuf::from("libgamekit_bridge.dylib")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_is_simulated() {
        let config = BridgeConfig::new();
        assert_eq!(config.backend, BackendKind::Simulated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let config: BridgeConfig = toml::from_str(
            r#"
                backend = "dynamic"
                library = "build/libgamekit_bridge.so"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Dynamic);
        assert!(config.validate().is_ok());

        let empty: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(empty, BridgeConfig::default());
    }

    #[test]
    fn test_dynamic_requires_library() {
        let config = BridgeConfig::new().with_backend(BackendKind::Dynamic);
        assert!(matches!(config.validate(), Err(InteropError::Config(_))));
    }
}
