//! Dependency-Track API models
//!
//! Wire types for the subset of the REST API this tool manages. Field names
//! follow the server's camelCase JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A named permission that can be granted to teams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OIDC group as known to Dependency-Track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcGroup {
    #[serde(default)]
    pub uuid: Uuid,
    pub name: String,
}

/// Mapping of an OIDC group onto a team. Has its own UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedOidcGroup {
    pub uuid: Uuid,
    pub group: OidcGroup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapped_oidc_groups: Vec<MappedOidcGroup>,
}

impl Team {
    /// Mapping that ties this team to the given OIDC group, if any
    pub fn mapping_for(&self, group: Uuid) -> Option<&MappedOidcGroup> {
        self.mapped_oidc_groups.iter().find(|m| m.group.uuid == group)
    }

    pub fn permission_names(&self) -> Vec<String> {
        self.permissions.iter().map(|p| p.name.clone()).collect()
    }
}

/// Package ecosystems a repository can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepositoryType {
    Cpan,
    Maven,
    Npm,
    Gem,
    Pypi,
    Nuget,
    Hex,
    Composer,
    Cargo,
    GoModules,
    Github,
}

impl RepositoryType {
    pub const ALL: [RepositoryType; 11] = [
        Self::Cpan,
        Self::Maven,
        Self::Npm,
        Self::Gem,
        Self::Pypi,
        Self::Nuget,
        Self::Hex,
        Self::Composer,
        Self::Cargo,
        Self::GoModules,
        Self::Github,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpan => "CPAN",
            Self::Maven => "MAVEN",
            Self::Npm => "NPM",
            Self::Gem => "GEM",
            Self::Pypi => "PYPI",
            Self::Nuget => "NUGET",
            Self::Hex => "HEX",
            Self::Composer => "COMPOSER",
            Self::Cargo => "CARGO",
            Self::GoModules => "GO_MODULES",
            Self::Github => "GITHUB",
        }
    }

    /// Comma separated list of accepted values
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown Repository Type: {:?}. Available Type Values: {}",
                    s,
                    Self::available()
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Nil until the server assigns one
    #[serde(default, skip_serializing_if = "Uuid::is_nil")]
    pub uuid: Uuid,
    #[serde(rename = "type")]
    pub repo_type: RepositoryType,
    pub identifier: String,
    pub url: String,
    #[serde(default)]
    pub resolution_order: i32,
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

impl Repository {
    /// Natural key: type and identifier
    pub fn key(&self) -> String {
        repository_key(self.repo_type, &self.identifier)
    }
}

pub fn repository_key(repo_type: RepositoryType, identifier: &str) -> String {
    format!("{}/{}", repo_type, identifier)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigProperty {
    pub group_name: String,
    pub property_name: String,
    #[serde(default)]
    pub property_value: Option<String>,
    pub property_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigProperty {
    pub fn id(&self) -> String {
        config_property_id(&self.group_name, &self.property_name)
    }
}

/// Stable identifier of a config property: `{group}_{name}` with dots in the
/// name replaced by dashes
pub fn config_property_id(group: &str, name: &str) -> String {
    format!("{}_{}", group, name.replace('.', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_team_deserializes_with_mappings() {
        let team: Team = serde_json::from_value(json!({
            "uuid": "6e5e4e4c-2b1d-4a0b-9a43-6c4b4e1d7d3a",
            "name": "Developers",
            "permissions": [{"name": "VIEW_PORTFOLIO", "description": "view"}],
            "mappedOidcGroups": [{
                "uuid": "0d2c8c1e-9bb4-4d5a-8c3a-0b6f0b1a4d11",
                "group": {"uuid": "1f1f1f1f-1111-4111-8111-111111111111", "name": "devs"}
            }],
            "apiKeys": []
        }))
        .unwrap();

        assert_eq!(team.permission_names(), vec!["VIEW_PORTFOLIO".to_string()]);
        let group = Uuid::parse_str("1f1f1f1f-1111-4111-8111-111111111111").unwrap();
        assert!(team.mapping_for(group).is_some());
        assert!(team.mapping_for(Uuid::nil()).is_none());
    }

    #[test]
    fn test_repository_type_parse() {
        assert_eq!("GO_MODULES".parse::<RepositoryType>().unwrap(), RepositoryType::GoModules);
        let err = "RUBYGEMS".parse::<RepositoryType>().unwrap_err();
        assert!(err.to_string().contains("Unknown Repository Type: \"RUBYGEMS\""));
        assert!(err.to_string().contains("GITHUB"));
    }

    #[test]
    fn test_repository_serializes_type_and_skips_nil_uuid() {
        let repo = Repository {
            uuid: Uuid::nil(),
            repo_type: RepositoryType::GoModules,
            identifier: "proxy.golang.org".to_string(),
            url: "https://proxy.golang.org".to_string(),
            resolution_order: 0,
            enabled: true,
            internal: false,
            authentication_required: false,
            username: None,
            password: None,
        };

        let value = serde_json::to_value(&repo).unwrap();
        assert_eq!(value["type"], "GO_MODULES");
        assert!(value.get("uuid").is_none());
        assert_eq!(repo.key(), "GO_MODULES/proxy.golang.org");
    }

    #[test]
    fn test_config_property_id() {
        let prop = ConfigProperty {
            group_name: "general".to_string(),
            property_name: "base.url".to_string(),
            property_value: Some("https://dtrack.example.com".to_string()),
            property_type: "URL".to_string(),
            description: None,
        };
        assert_eq!(prop.id(), "general_base-url");
    }
}
