//! Session gateway to the PAN-OS XML API.
//!
//! ## Architecture
//!
//! - `response`: envelope and field extraction from XML replies
//! - `client`: [`PanXapi`], the HTTPS implementation of [`XapiSession`]
//!
//! Everything above this module talks to [`XapiSession`] only, so the
//! sequencers can be driven by a recording session in tests.

mod client;
mod response;

use async_trait::async_trait;

use crate::error::Result;

pub use client::{PanXapi, SessionOptions};
pub use response::{ApiResponse, DeviceEntry, Envelope};

/// Whether a commit is local to Panorama or pushed to managed devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitScope {
    /// `type=commit`
    Local,
    /// `type=commit&action=all`
    All,
}

/// An authenticated handle to a Panorama or firewall management endpoint.
#[async_trait]
pub trait XapiSession: Send + Sync {
    /// Run an operational command. `target` is a managed device serial
    /// number when Panorama proxies the call to a firewall.
    async fn op(&self, cmd: &str, target: Option<&str>) -> Result<ApiResponse>;

    /// Create or merge `element` at `xpath` in the candidate configuration.
    async fn set(&self, xpath: &str, element: &str) -> Result<ApiResponse>;

    /// Delete the node at `xpath` from the candidate configuration.
    async fn delete(&self, xpath: &str) -> Result<ApiResponse>;

    async fn commit(&self, cmd: &str, scope: CommitScope) -> Result<ApiResponse>;
}
