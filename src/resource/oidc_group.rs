//! OIDC group handler
//!
//! Groups are keyed by name. Each group maps onto zero or more teams; every
//! mapping is its own remote object with a UUID, so removing one needs the
//! mapping rather than the team.

use super::HandlerError;
use crate::dtrack::models::{MappedOidcGroup, OidcGroup, Team};
use crate::dtrack::DtrackClient;
use crate::sync::{fetch_all, fetch_all_indexed, index_by, Outcome, Plan, SetReconciler};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Desired state of an OIDC group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcGroupSpec {
    pub name: String,
    /// Names of the teams the group maps onto
    #[serde(default)]
    pub teams: Vec<String>,
}

pub struct OidcGroupHandler<'a> {
    client: &'a DtrackClient,
    mappings: SetReconciler,
}

/// Current mappings of `group`, keyed by team name
pub fn mappings_by_team(group: Uuid, teams: Vec<Team>) -> HashMap<String, MappedOidcGroup> {
    teams
        .into_iter()
        .filter_map(|team| {
            let mapping = team.mapping_for(group).cloned();
            if mapping.is_none() {
                tracing::warn!("Team {} lists OIDC group {} without a mapping", team.name, group);
            }
            mapping.map(|m| (team.name, m))
        })
        .collect()
}

impl<'a> OidcGroupHandler<'a> {
    pub fn new(client: &'a DtrackClient) -> Self {
        Self {
            client,
            mappings: SetReconciler::new("team"),
        }
    }

    pub async fn list(&self) -> Result<Vec<OidcGroup>> {
        let client = self.client;
        Ok(fetch_all("OIDC group", client.page_size(), |po| client.list_oidc_groups(po)).await?)
    }

    pub async fn list_by_name(&self) -> Result<HashMap<String, OidcGroup>> {
        Ok(index_by(self.list().await?, |g| g.name.clone()))
    }

    /// All teams, by name
    pub async fn team_universe(&self) -> Result<HashMap<String, Team>> {
        let client = self.client;
        Ok(fetch_all_indexed(
            "team",
            client.page_size(),
            |po| client.list_teams(po),
            |t| t.name.clone(),
        )
        .await?)
    }

    pub async fn current_mappings(&self, group: Uuid) -> Result<HashMap<String, MappedOidcGroup>> {
        let teams = self.client.list_oidc_group_teams(group).await?;
        Ok(mappings_by_team(group, teams))
    }

    /// Mapping edits needed to bring `group` (or a group not created yet) to `desired`
    pub async fn plan_teams(
        &self,
        group: Option<&OidcGroup>,
        desired: &[String],
        universe: &HashMap<String, Team>,
    ) -> Result<Plan<String, Team, MappedOidcGroup>> {
        let current = match group {
            Some(g) => self.current_mappings(g.uuid).await?,
            None => HashMap::new(),
        };
        Ok(self.mappings.plan(desired, current, universe)?)
    }

    /// Converge the group's team mappings to `desired`
    pub async fn sync_teams(&self, group: &OidcGroup, desired: &[String]) -> Result<Outcome<String>> {
        let universe = self.team_universe().await?;
        let plan = self.plan_teams(Some(group), desired, &universe).await?;
        self.apply_teams(group.uuid, plan).await
    }

    /// Apply a mapping plan to the group with the given UUID
    pub async fn apply_teams(
        &self,
        group: Uuid,
        plan: Plan<String, Team, MappedOidcGroup>,
    ) -> Result<Outcome<String>> {
        let client = self.client;
        let outcome = plan
            .apply(
                |team: Team| async move { client.add_oidc_mapping(group, team.uuid).await },
                |mapping: MappedOidcGroup| async move { client.remove_oidc_mapping(mapping.uuid).await },
            )
            .await?;
        Ok(outcome)
    }

    /// Create a group and map it onto its teams.
    ///
    /// Team names are resolved before the group is created.
    pub async fn create(&self, spec: &OidcGroupSpec) -> Result<(OidcGroup, Outcome<String>)> {
        if let Some(existing) = self.list_by_name().await?.remove(&spec.name) {
            return Err(HandlerError::AlreadyExists {
                kind: "OIDC group",
                name: spec.name.clone(),
                uuid: existing.uuid,
            }
            .into());
        }

        let universe = self.team_universe().await?;
        let plan = self.plan_teams(None, &spec.teams, &universe).await?;

        let group = self.client.create_oidc_group(&spec.name).await?;
        tracing::info!("Created OIDC group {} ({})", group.name, group.uuid);

        let outcome = self.apply_teams(group.uuid, plan).await?;
        Ok((group, outcome))
    }

    /// Read a group; `None` if the server no longer lists it
    pub async fn read(&self, uuid: Uuid) -> Result<Option<OidcGroup>> {
        Ok(self.list().await?.into_iter().find(|g| g.uuid == uuid))
    }

    /// Rename the group if needed and converge its team mappings
    pub async fn update(&self, uuid: Uuid, spec: &OidcGroupSpec) -> Result<(OidcGroup, Outcome<String>)> {
        let Some(mut group) = self.read(uuid).await? else {
            return Err(HandlerError::NotFound {
                kind: "OIDC group",
                key: uuid.to_string(),
            }
            .into());
        };

        if group.name != spec.name {
            tracing::info!("Renaming OIDC group {} to {}", group.name, spec.name);
            group.name = spec.name.clone();
            group = self.client.update_oidc_group(&group).await?;
        }

        let outcome = self.sync_teams(&group, &spec.teams).await?;
        Ok((group, outcome))
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        self.client.delete_oidc_group(uuid).await?;
        tracing::info!("Deleted OIDC group {}", uuid);
        Ok(())
    }
}
