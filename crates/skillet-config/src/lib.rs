//! # skillet-config
//!
//! Tool-wide configuration for skillet. Reads from `skillet.toml`, environment
//! variables and CLI overrides, in that precedence order.
//!
//! This is process-wide state (cache location, TTL, logging), independent of
//! any one project's `skills.toml`.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    AgentsConfig, CacheConfig, ConfigWarning, LoggingConfig, SkilletConfig, TrustConfig,
    WarningSeverity,
};
