//! Repository handler
//!
//! Repositories are keyed by `TYPE/identifier`.

use crate::dtrack::models::{repository_key, Repository, RepositoryType};
use crate::dtrack::DtrackClient;
use crate::sync::{fetch_all, index_by};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

fn default_enabled() -> bool {
    true
}

/// Desired state of a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySpec {
    #[serde(rename = "type")]
    pub repo_type: RepositoryType,
    pub identifier: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub authentication_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl RepositorySpec {
    pub fn key(&self) -> String {
        repository_key(self.repo_type, &self.identifier)
    }

    /// Wire representation; `existing` carries the server-assigned fields
    pub fn to_repository(&self, existing: Option<&Repository>) -> Repository {
        Repository {
            uuid: existing.map(|r| r.uuid).unwrap_or_default(),
            repo_type: self.repo_type,
            identifier: self.identifier.clone(),
            url: self.url.clone(),
            resolution_order: existing.map(|r| r.resolution_order).unwrap_or_default(),
            enabled: self.enabled,
            internal: self.internal,
            authentication_required: self.authentication_required,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// True if applying the spec would change `repo`.
    ///
    /// Passwords are write-only and not compared.
    pub fn differs_from(&self, repo: &Repository) -> bool {
        self.url != repo.url
            || self.enabled != repo.enabled
            || self.internal != repo.internal
            || self.authentication_required != repo.authentication_required
            || self.username.as_deref().unwrap_or_default() != repo.username.as_deref().unwrap_or_default()
    }
}

impl From<&Repository> for RepositorySpec {
    fn from(repo: &Repository) -> Self {
        Self {
            repo_type: repo.repo_type,
            identifier: repo.identifier.clone(),
            url: repo.url.clone(),
            enabled: repo.enabled,
            internal: repo.internal,
            authentication_required: repo.authentication_required,
            username: repo.username.clone().filter(|u| !u.is_empty()),
            password: None,
        }
    }
}

pub struct RepositoryHandler<'a> {
    client: &'a DtrackClient,
}

impl<'a> RepositoryHandler<'a> {
    pub fn new(client: &'a DtrackClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Repository>> {
        let client = self.client;
        Ok(fetch_all("repository", client.page_size(), |po| client.list_repositories(po)).await?)
    }

    pub async fn list_by_type(&self, repo_type: RepositoryType) -> Result<Vec<Repository>> {
        let client = self.client;
        Ok(fetch_all("repository", client.page_size(), |po| {
            client.list_repositories_by_type(repo_type, po)
        })
        .await?)
    }

    pub async fn list_by_key(&self) -> Result<HashMap<String, Repository>> {
        Ok(index_by(self.list().await?, Repository::key))
    }

    pub async fn find(&self, repo_type: RepositoryType, identifier: &str) -> Result<Option<Repository>> {
        Ok(self
            .list_by_type(repo_type)
            .await?
            .into_iter()
            .find(|r| r.identifier == identifier))
    }

    pub async fn create(&self, spec: &RepositorySpec) -> Result<Repository> {
        let created = self.client.create_repository(&spec.to_repository(None)).await?;
        tracing::info!("Created repository {} ({})", created.key(), created.uuid);
        Ok(created)
    }

    /// Read a repository of the given type; `None` if it no longer exists
    pub async fn read(&self, repo_type: RepositoryType, uuid: Uuid) -> Result<Option<Repository>> {
        Ok(self
            .list_by_type(repo_type)
            .await?
            .into_iter()
            .find(|r| r.uuid == uuid))
    }

    pub async fn update(&self, existing: &Repository, spec: &RepositorySpec) -> Result<Repository> {
        let updated = self
            .client
            .update_repository(&spec.to_repository(Some(existing)))
            .await?;
        tracing::info!("Updated repository {}", updated.key());
        Ok(updated)
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        self.client.delete_repository(uuid).await?;
        tracing::info!("Deleted repository {}", uuid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RepositorySpec {
        serde_yaml::from_str(
            "type: MAVEN\nidentifier: central\nurl: https://repo1.maven.org/maven2/\n",
        )
        .unwrap()
    }

    #[test]
    fn test_spec_defaults() {
        let spec = spec();
        assert!(spec.enabled);
        assert!(!spec.internal);
        assert_eq!(spec.key(), "MAVEN/central");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<RepositorySpec, _> =
            serde_yaml::from_str("type: RUBYGEMS\nidentifier: x\nurl: https://x\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_differs_ignores_password_and_keeps_server_fields() {
        let spec = RepositorySpec {
            password: Some("secret".to_string()),
            ..spec()
        };
        let existing = Repository {
            uuid: Uuid::from_u128(7),
            resolution_order: 3,
            password: None,
            ..spec.to_repository(None)
        };

        assert!(!spec.differs_from(&existing));

        let changed = RepositorySpec {
            url: "https://mirror.example.com/maven2/".to_string(),
            ..spec.clone()
        };
        assert!(changed.differs_from(&existing));

        let wire = changed.to_repository(Some(&existing));
        assert_eq!(wire.uuid, Uuid::from_u128(7));
        assert_eq!(wire.resolution_order, 3);
    }
}
