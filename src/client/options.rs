//! Per-request option overrides.
//!
//! [`RequestOptions`] is the closed set of fields the multi-target executor
//! (`crate::multi`) can override on a per-operation basis without
//! reconstructing a [`Client`](super::Client) from scratch. Every field is
//! optional; an absent field falls through to the base configuration.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::v3::{AuthProtocol, PrivProtocol};
use crate::version::Version;

/// Per-request overrides layered on top of a [`Client`](super::Client)'s base
/// [`ClientConfig`](super::ClientConfig).
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub version: Option<Version>,
    pub community: Option<Bytes>,
    pub user: Option<Bytes>,
    pub auth_protocol: Option<AuthProtocol>,
    pub auth_password: Option<Vec<u8>>,
    pub priv_protocol: Option<PrivProtocol>,
    pub priv_password: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub max_repetitions: Option<i32>,
    pub non_repeaters: Option<i32>,
    pub source_address: Option<SocketAddr>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject field values that are never meaningful, independent of
    /// whatever they'd be layered on top of.
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(Error::InvalidOption { message: "timeout must be positive".into() });
            }
        }
        if let Some(max_repetitions) = self.max_repetitions {
            if max_repetitions < 0 {
                return Err(Error::InvalidOption {
                    message: "max_repetitions must not be negative".into(),
                });
            }
        }
        if let Some(non_repeaters) = self.non_repeaters {
            if non_repeaters < 0 {
                return Err(Error::InvalidOption { message: "non_repeaters must not be negative".into() });
            }
        }
        Ok(())
    }

    /// Strip bulk-only fields when the target turns out to be v1: GETBULK
    /// doesn't exist there, so these overrides would otherwise silently
    /// target a PDU type that's never built.
    pub fn for_version(mut self, version: Version) -> Self {
        if version == Version::V1 {
            self.max_repetitions = None;
            self.non_repeaters = None;
        }
        self
    }

    /// Layer `self` as the per-operation override on top of `global`,
    /// falling back field-by-field when `self`'s value is absent or fails
    /// its own validity check.
    pub fn merge_overrides(&self, global: &RequestOptions) -> RequestOptions {
        RequestOptions {
            version: self.version.or(global.version),
            community: self.community.clone().or_else(|| global.community.clone()),
            user: self.user.clone().or_else(|| global.user.clone()),
            auth_protocol: self.auth_protocol.or(global.auth_protocol),
            auth_password: self.auth_password.clone().or_else(|| global.auth_password.clone()),
            priv_protocol: self.priv_protocol.or(global.priv_protocol),
            priv_password: self.priv_password.clone().or_else(|| global.priv_password.clone()),
            timeout: self.timeout.filter(|t| !t.is_zero()).or(global.timeout),
            retries: self.retries.or(global.retries),
            max_repetitions: self.max_repetitions.filter(|&m| m >= 0).or(global.max_repetitions),
            non_repeaters: self.non_repeaters.filter(|&n| n >= 0).or(global.non_repeaters),
            source_address: self.source_address.or(global.source_address),
        }
    }
}
