//! Panorama / PAN-OS operational tooling.
//!
//! Resolves firewall hostnames from serial numbers, moves managed firewalls
//! between device-group / template-stack pairs, and drives content and
//! anti-virus updates through Panorama. Long-running calls are followed to
//! completion by [`core::JobPoller`].

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod logging;
pub mod xapi;

pub use error::{PanError, Result};
