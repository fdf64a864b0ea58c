//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`; never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod health_monitor;
pub mod lifecycle;
pub mod locks;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;
