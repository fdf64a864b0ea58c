//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod render;
pub mod shell;
pub mod systemd;
pub mod unit;

#[allow(unused_imports)]
pub use config::BerthConfig;
#[allow(unused_imports)]
pub use error::{ConfigError, ExecError, LifecycleError, ValidationError};
#[allow(unused_imports)]
pub use health::{CheckVerdict, TrackedAgent};
#[allow(unused_imports)]
pub use identity::{AgentIdentity, resolve, validate_agent_id};
