//! Dependency-Track API interaction module
//!
//! # Module Structure
//!
//! - [`client`] - Main client exposing the managed endpoints
//! - [`http`] - HTTP utilities for REST API calls (API key header, paging headers, errors)
//! - [`models`] - Wire types for teams, permissions, OIDC groups, repositories and config properties
//!
//! # Example
//!
//! ```ignore
//! use dtrackctl::dtrack::client::DtrackClient;
//! use dtrackctl::sync::{fetch_all, PageOptions};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = DtrackClient::new("https://dtrack.example.com", "odt_...")?;
//!     let teams = fetch_all("team", client.page_size(), |po| client.list_teams(po)).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod models;

pub use client::DtrackClient;
pub use http::{is_not_found, ApiError};
