//! Gateway connection state
//!
//! Session tracking, heartbeats and recovery decisions for one gateway
//! connection.

mod connection;
mod error;
mod session;

pub use connection::GatewayConnection;
pub use error::{ConnectionError, ConnectionResult};
pub use session::{Heartbeat, Session};
