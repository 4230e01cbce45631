//! Core types shared by the bridge
//!
//! This module defines the handle alias that crosses the native boundary, the
//! error type returned by every fallible bridge call, and the local value types
//! that foreign callback arguments are translated into.

use std::ffi::c_void;
use std::fmt;

/// Opaque reference to an object owned by the native runtime
pub type RawHandle = *mut c_void;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, InteropError>;

/// Errors raised by the bridge itself
///
/// Failures reported by the native runtime (e.g. matchmaking errors) are not
/// represented here; they reach the registered delegate as [`NsError`] values.
#[derive(Debug, thiserror::Error)]
pub enum InteropError {
    #[error("Invalid native handle for {0}")]
    InvalidHandle(&'static str),

    #[error("Failed to load native library: {0}")]
    LibraryLoad(String),

    #[error("Missing native symbol: {0}")]
    MissingSymbol(String),

    #[error("Invalid string for native call: {0}")]
    InvalidString(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Local copy of a native `NSError`
///
/// Built by the delegate forwarder from the foreign error object before the
/// listener is called, so listeners never touch native memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsError {
    /// Error domain (e.g. `GKErrorDomain`)
    pub domain: String,
    /// Domain-specific error code
    pub code: i64,
    /// Human readable description, if the native object carried one
    pub localized_description: Option<String>,
}

impl NsError {
    /// Create a new error value
    pub fn new(domain: impl Into<String>, code: i64) -> Self {
        Self {
            domain: domain.into(),
            code,
            localized_description: None,
        }
    }

    /// Builder method: attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.localized_description = Some(description.into());
        self
    }
}

impl fmt::Display for NsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.localized_description {
            Some(description) => write!(f, "{} ({}): {}", self.domain, self.code, description),
            None => write!(f, "{} ({})", self.domain, self.code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ns_error_display() {
        let err = NsError::new("GKErrorDomain", 2).with_description("The requested operation has been cancelled.");
        assert_eq!(
            err.to_string(),
            "GKErrorDomain (2): The requested operation has been cancelled."
        );
        assert_eq!(NsError::new("NSCocoaErrorDomain", -1).to_string(), "NSCocoaErrorDomain (-1)");
    }

    #[test]
    fn test_invalid_handle_message() {
        let err = InteropError::InvalidHandle("TurnBasedMatchmakerViewController");
        assert_eq!(
            err.to_string(),
            "Invalid native handle for TurnBasedMatchmakerViewController"
        );
    }
}
