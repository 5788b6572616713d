//! Resource handlers
//!
//! One handler per managed object kind. Each borrows the [`DtrackClient`]
//! it is given and implements create/read/update/delete on top of it; the
//! relation-bearing kinds (teams and OIDC groups) drive the generic
//! [`crate::sync::SetReconciler`] to converge their permissions and team
//! mappings.
//!
//! # Architecture
//!
//! - [`team`] - Teams and their permissions
//! - [`oidc_group`] - OIDC groups and their team mappings
//! - [`repository`] - Package repositories, keyed by type and identifier
//! - [`config_property`] - Server config properties (read and update only)
//! - [`manifest`] - Declarative desired state: apply, dry-run and export
//!
//! [`DtrackClient`]: crate::dtrack::DtrackClient

pub mod config_property;
pub mod manifest;
pub mod oidc_group;
pub mod repository;
pub mod team;

use thiserror::Error;

pub use config_property::{ConfigPropertyHandler, ConfigPropertySpec};
pub use manifest::{Action, Applier, ApplyError, ApplyReport, Change, Manifest};
pub use oidc_group::{OidcGroupHandler, OidcGroupSpec};
pub use repository::{RepositoryHandler, RepositorySpec};
pub use team::{TeamHandler, TeamSpec};

/// Handler-level failures that are not transport or reconciliation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("A {kind} with name {name:?} exists already with UUID {uuid}")]
    AlreadyExists {
        kind: &'static str,
        name: String,
        uuid: uuid::Uuid,
    },

    #[error("{operation} {kind} is not supported")]
    Unsupported {
        operation: &'static str,
        kind: &'static str,
    },

    #[error("{kind} {key:?} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("duplicate {kind} {key:?} in manifest")]
    Duplicate { kind: &'static str, key: String },
}
