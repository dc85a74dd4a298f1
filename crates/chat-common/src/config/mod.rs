//! Configuration structs

mod app_config;
mod queue_config;

pub use app_config::{AppSettings, ClientConfig, ConfigError, Environment, GatewayConfig};
pub use queue_config::{OverflowStrategy, QueueOptions, TimeoutStrategy};
