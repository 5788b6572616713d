//! dtrackctl - declarative configuration management for Dependency-Track
//!
//! - [`sync`] - Paged collection, keyed indexing and set reconciliation
//! - [`dtrack`] - REST client for the managed endpoints
//! - [`resource`] - Per-kind handlers and the manifest applier
//! - [`config`] - Persistent user configuration

pub mod config;
pub mod dtrack;
pub mod resource;
pub mod sync;

/// Version injected at compile time via DTRACKCTL_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("DTRACKCTL_VERSION") {
    Some(v) => v,
    None => "dev",
};
