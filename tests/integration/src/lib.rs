//! Integration test utilities for the gateway client
//!
//! Drives a `GatewayConnection` with scripted gateway frames and records
//! what the application handler receives.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
