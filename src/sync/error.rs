//! Reconciliation errors
//!
//! The three failure kinds of a sync pass are kept apart so callers can tell
//! a broken listing from a configuration mistake from a half-applied change.

use std::fmt;
use thiserror::Error;

/// Direction of a single relation edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Add,
    Remove,
}

impl EditOp {
    pub fn verb(&self) -> &'static str {
        match self {
            EditOp::Add => "add",
            EditOp::Remove => "remove",
        }
    }
}

/// One relation edit, identified by the far-endpoint natural key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub op: EditOp,
    pub key: String,
}

impl Edit {
    pub fn add(key: impl Into<String>) -> Self {
        Self {
            op: EditOp::Add,
            key: key.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            op: EditOp::Remove,
            key: key.into(),
        }
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            EditOp::Add => write!(f, "+ {}", self.key),
            EditOp::Remove => write!(f, "- {}", self.key),
        }
    }
}

/// Edits that went through before a mutation failed, and those never tried
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub applied: Vec<Edit>,
    pub not_attempted: Vec<Edit>,
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// A page fetch failed; nothing was reconciled
    #[error("failed to list {kind} (page {page})")]
    Listing {
        kind: String,
        page: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A desired key does not resolve to any existing item
    #[error("{kind} {key:?} not found")]
    NotFound { kind: String, key: String },

    /// A remote add/remove call failed part way through a pass
    #[error(
        "failed to {verb} {kind} {key:?} ({applied} applied, {pending} not attempted)",
        verb = .failed.op.verb(),
        key = .failed.key,
        applied = .progress.applied.len(),
        pending = .progress.not_attempted.len()
    )]
    Mutation {
        kind: String,
        failed: Edit,
        progress: Progress,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    /// Key named by the error, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            SyncError::Listing { .. } => None,
            SyncError::NotFound { key, .. } => Some(key),
            SyncError::Mutation { failed, .. } => Some(&failed.key),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }
}
