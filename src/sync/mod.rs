//! Relation synchronization core
//!
//! Generic building blocks shared by every resource handler that has to
//! converge a many-to-many relation on the server to a declared set.
//!
//! # Module Structure
//!
//! - [`fetcher`] - Drains paginated listings into a single `Vec`
//! - [`index`] - Indexes items by natural key (last write wins)
//! - [`reconciler`] - Diffs desired keys against current edges and applies the edits
//! - [`error`] - Listing, not-found and mutation failures
//!
//! # Example
//!
//! ```ignore
//! use dtrackctl::sync::{fetch_all_indexed, index_by, SetReconciler};
//!
//! async fn sync_permissions(client: &DtrackClient, team: &Team, desired: &[String]) -> anyhow::Result<()> {
//!     let universe = fetch_all_indexed("permission", 100, |po| client.list_permissions(po), |p| p.name.clone()).await?;
//!     let current = index_by(team.permissions.clone(), |p| p.name.clone());
//!     SetReconciler::new("permission")
//!         .reconcile(desired, current, &universe,
//!             |p: Permission| async move { client.add_permission_to_team(&p.name, team.uuid).await },
//!             |p: Permission| async move { client.remove_permission_from_team(&p.name, team.uuid).await })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fetcher;
pub mod index;
pub mod reconciler;

pub use error::{Edit, EditOp, Progress, SyncError};
pub use fetcher::{fetch_all, fetch_all_indexed, Page, PageOptions, DEFAULT_PAGE_SIZE};
pub use index::index_by;
pub use reconciler::{Outcome, Plan, SetReconciler};
