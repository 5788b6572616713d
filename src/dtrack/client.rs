//! Dependency-Track Client
//!
//! Main client for the Dependency-Track REST API, combining the API key,
//! base URL and HTTP functionality. Handlers receive it explicitly; there is
//! no process-wide client.

use super::http::DtrackHttpClient;
pub use super::http::format_api_error;
use super::models::{
    ConfigProperty, MappedOidcGroup, OidcGroup, Permission, Repository, RepositoryType, Team,
};
use crate::sync::{Page, PageOptions, DEFAULT_PAGE_SIZE};
use anyhow::{Context, Result};
use serde_json::json;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Main Dependency-Track client
#[derive(Clone)]
pub struct DtrackClient {
    http: DtrackHttpClient,
    api_key: String,
    base_url: String,
    page_size: usize,
}

impl DtrackClient {
    /// Create a new client for the server at `host`
    pub fn new(host: &str, api_key: &str) -> Result<Self> {
        Self::with_options(host, api_key, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT)
    }

    pub fn with_options(host: &str, api_key: &str, page_size: usize, timeout: Duration) -> Result<Self> {
        let url = Url::parse(host).with_context(|| format!("Invalid Dependency-Track host {:?}", host))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Unsupported scheme {:?} in host {:?}", url.scheme(), host);
        }
        if api_key.is_empty() {
            anyhow::bail!("No API key configured. Set DEPENDENCYTRACK_API_KEY");
        }

        Ok(Self {
            http: DtrackHttpClient::new(timeout)?,
            api_key: api_key.to_string(),
            base_url: url.as_str().trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Page size used when draining listings
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Build an API v1 URL
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    // =========================================================================
    // Teams
    // =========================================================================

    pub async fn list_teams(&self, page: PageOptions) -> Result<Page<Team>> {
        self.http
            .get_page(&self.api_url("team"), &self.api_key, page)
            .await
    }

    pub async fn get_team(&self, uuid: Uuid) -> Result<Team> {
        self.http
            .get(&self.api_url(&format!("team/{}", uuid)), &self.api_key)
            .await
            .with_context(|| format!("Failed to read team {}", uuid))
    }

    pub async fn create_team(&self, name: &str) -> Result<Team> {
        self.http
            .put(&self.api_url("team"), &self.api_key, &json!({ "name": name }))
            .await
            .with_context(|| format!("Failed to create team {:?}", name))
    }

    pub async fn update_team(&self, team: &Team) -> Result<Team> {
        self.http
            .post(&self.api_url("team"), &self.api_key, Some(team))
            .await
            .with_context(|| format!("Failed to update team {}", team.uuid))
    }

    pub async fn delete_team(&self, uuid: Uuid) -> Result<()> {
        self.http
            .delete(&self.api_url("team"), &self.api_key, Some(&json!({ "uuid": uuid })))
            .await
            .with_context(|| format!("Failed to delete team {}", uuid))
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    pub async fn list_permissions(&self, page: PageOptions) -> Result<Page<Permission>> {
        self.http
            .get_page(&self.api_url("permission"), &self.api_key, page)
            .await
    }

    fn permission_team_url(&self, permission: &str, team: Uuid) -> String {
        self.api_url(&format!(
            "permission/{}/team/{}",
            urlencoding::encode(permission),
            team
        ))
    }

    pub async fn add_permission_to_team(&self, permission: &str, team: Uuid) -> Result<Team> {
        self.http
            .post::<(), _>(&self.permission_team_url(permission, team), &self.api_key, None)
            .await
            .with_context(|| format!("Failed to add permission {} to team {}", permission, team))
    }

    pub async fn remove_permission_from_team(&self, permission: &str, team: Uuid) -> Result<()> {
        self.http
            .delete::<()>(&self.permission_team_url(permission, team), &self.api_key, None)
            .await
            .with_context(|| format!("Failed to remove permission {} from team {}", permission, team))
    }

    // =========================================================================
    // OIDC groups and mappings
    // =========================================================================

    pub async fn list_oidc_groups(&self, page: PageOptions) -> Result<Page<OidcGroup>> {
        self.http
            .get_page(&self.api_url("oidc/group"), &self.api_key, page)
            .await
    }

    pub async fn create_oidc_group(&self, name: &str) -> Result<OidcGroup> {
        self.http
            .put(&self.api_url("oidc/group"), &self.api_key, &json!({ "name": name }))
            .await
            .with_context(|| format!("Failed to create OIDC group {:?}", name))
    }

    pub async fn update_oidc_group(&self, group: &OidcGroup) -> Result<OidcGroup> {
        self.http
            .post(&self.api_url("oidc/group"), &self.api_key, Some(group))
            .await
            .with_context(|| format!("Failed to update OIDC group {}", group.uuid))
    }

    pub async fn delete_oidc_group(&self, uuid: Uuid) -> Result<()> {
        self.http
            .delete::<()>(&self.api_url(&format!("oidc/group/{}", uuid)), &self.api_key, None)
            .await
            .with_context(|| format!("Failed to delete OIDC group {}", uuid))
    }

    /// Teams the group is currently mapped to (not paginated by the server)
    pub async fn list_oidc_group_teams(&self, group: Uuid) -> Result<Vec<Team>> {
        let teams: Option<Vec<Team>> = self
            .http
            .get(&self.api_url(&format!("oidc/group/{}/team", group)), &self.api_key)
            .await
            .with_context(|| format!("Failed to list teams of OIDC group {}", group))?;
        Ok(teams.unwrap_or_default())
    }

    pub async fn add_oidc_mapping(&self, group: Uuid, team: Uuid) -> Result<MappedOidcGroup> {
        self.http
            .put(
                &self.api_url("oidc/mapping"),
                &self.api_key,
                &json!({ "team": team, "group": group }),
            )
            .await
            .with_context(|| format!("Failed to map OIDC group {} to team {}", group, team))
    }

    pub async fn remove_oidc_mapping(&self, mapping: Uuid) -> Result<()> {
        self.http
            .delete::<()>(&self.api_url(&format!("oidc/mapping/{}", mapping)), &self.api_key, None)
            .await
            .with_context(|| format!("Failed to remove OIDC mapping {}", mapping))
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    pub async fn list_repositories(&self, page: PageOptions) -> Result<Page<Repository>> {
        self.http
            .get_page(&self.api_url("repository"), &self.api_key, page)
            .await
    }

    pub async fn list_repositories_by_type(
        &self,
        repo_type: RepositoryType,
        page: PageOptions,
    ) -> Result<Page<Repository>> {
        self.http
            .get_page(
                &self.api_url(&format!("repository/{}", repo_type)),
                &self.api_key,
                page,
            )
            .await
    }

    pub async fn create_repository(&self, repository: &Repository) -> Result<Repository> {
        self.http
            .put(&self.api_url("repository"), &self.api_key, repository)
            .await
            .with_context(|| format!("Failed to create repository {}", repository.key()))
    }

    pub async fn update_repository(&self, repository: &Repository) -> Result<Repository> {
        self.http
            .post(&self.api_url("repository"), &self.api_key, Some(repository))
            .await
            .with_context(|| format!("Failed to update repository {}", repository.key()))
    }

    pub async fn delete_repository(&self, uuid: Uuid) -> Result<()> {
        self.http
            .delete::<()>(&self.api_url(&format!("repository/{}", uuid)), &self.api_key, None)
            .await
            .with_context(|| format!("Failed to delete repository {}", uuid))
    }

    // =========================================================================
    // Config properties
    // =========================================================================

    /// All config properties (the server returns them in one response)
    pub async fn list_config_properties(&self) -> Result<Vec<ConfigProperty>> {
        let properties: Option<Vec<ConfigProperty>> = self
            .http
            .get(&self.api_url("configProperty"), &self.api_key)
            .await
            .context("Failed to list config properties")?;
        Ok(properties.unwrap_or_default())
    }

    pub async fn update_config_property(&self, property: &ConfigProperty) -> Result<ConfigProperty> {
        self.http
            .post(&self.api_url("configProperty"), &self.api_key, Some(property))
            .await
            .with_context(|| format!("Failed to update config property {}", property.id()))
    }
}
