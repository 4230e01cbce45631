//! Match request proxy
//!
//! Mirrors the subset of `GKMatchRequest` a turn-based matchmaker needs:
//! player counts and the invitation message.

use crate::bridge::Bridge;
use crate::handle::NativeHandle;
use crate::types::{InteropError, RawHandle, Result};
use std::ffi::CString;
use std::sync::Arc;

/// Proxy for a native `GKMatchRequest`
#[derive(Debug)]
pub struct MatchRequest {
    bridge: Bridge,
    handle: NativeHandle,
}

impl MatchRequest {
    const TYPE_NAME: &'static str = "MatchRequest";

    /// Allocate a new native match request
    pub fn new(bridge: &Bridge) -> Self {
        let raw = bridge.runtime().match_request_new();
        if raw.is_null() {
            log::warn!("Native match request allocation returned null");
        }

        Self {
            bridge: bridge.clone(),
            handle: NativeHandle::adopt(Arc::clone(bridge.runtime()), raw),
        }
    }

    pub(crate) fn raw(&self) -> Result<RawHandle> {
        self.handle.as_raw(Self::TYPE_NAME)
    }

    /// False if native allocation failed or the request was disposed
    pub fn is_valid(&self) -> bool {
        self.raw().is_ok()
    }

    pub fn min_players(&self) -> Result<usize> {
        let this = self.raw()?;
        Ok(self.bridge.runtime().match_request_min_players(this))
    }

    pub fn set_min_players(&self, value: usize) -> Result<()> {
        let this = self.raw()?;
        self.bridge.runtime().match_request_set_min_players(this, value);
        Ok(())
    }

    pub fn max_players(&self) -> Result<usize> {
        let this = self.raw()?;
        Ok(self.bridge.runtime().match_request_max_players(this))
    }

    pub fn set_max_players(&self, value: usize) -> Result<()> {
        let this = self.raw()?;
        self.bridge.runtime().match_request_set_max_players(this, value);
        Ok(())
    }

    /// Message sent with invitations (None if unset)
    pub fn invite_message(&self) -> Result<Option<String>> {
        let this = self.raw()?;
        Ok(self.bridge.runtime().match_request_invite_message(this))
    }

    pub fn set_invite_message(&self, message: Option<&str>) -> Result<()> {
        let this = self.raw()?;
        let message = message
            .map(CString::new)
            .transpose()
            .map_err(|e| InteropError::InvalidString(e.to_string()))?;

        self.bridge
            .runtime()
            .match_request_set_invite_message(this, message.as_deref());
        Ok(())
    }

    /// Release the native request
    pub fn dispose(self) {
        self.handle.release();
    }
}
