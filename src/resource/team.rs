//! Team handler
//!
//! Teams are keyed by name. Their permissions are a many-to-many relation
//! converged through the set reconciler.

use super::HandlerError;
use crate::dtrack::models::{Permission, Team};
use crate::dtrack::{is_not_found, DtrackClient};
use crate::sync::{fetch_all, fetch_all_indexed, index_by, Outcome, Plan, SetReconciler};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Desired state of a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSpec {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl From<&Team> for TeamSpec {
    fn from(team: &Team) -> Self {
        let mut permissions = team.permission_names();
        permissions.sort();
        Self {
            name: team.name.clone(),
            permissions,
        }
    }
}

pub struct TeamHandler<'a> {
    client: &'a DtrackClient,
    permissions: SetReconciler,
}

impl<'a> TeamHandler<'a> {
    pub fn new(client: &'a DtrackClient) -> Self {
        Self {
            client,
            permissions: SetReconciler::new("permission"),
        }
    }

    pub async fn list(&self) -> Result<Vec<Team>> {
        let client = self.client;
        Ok(fetch_all("team", client.page_size(), |po| client.list_teams(po)).await?)
    }

    pub async fn list_by_name(&self) -> Result<HashMap<String, Team>> {
        Ok(index_by(self.list().await?, |t| t.name.clone()))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Team>> {
        Ok(self.list_by_name().await?.remove(name))
    }

    /// All permissions known to the server, by name
    pub async fn permission_universe(&self) -> Result<HashMap<String, Permission>> {
        let client = self.client;
        Ok(fetch_all_indexed(
            "permission",
            client.page_size(),
            |po| client.list_permissions(po),
            |p| p.name.clone(),
        )
        .await?)
    }

    /// Permission edits needed to bring `team` (or a team not created yet) to `desired`
    pub fn plan_permissions(
        &self,
        team: Option<&Team>,
        desired: &[String],
        universe: &HashMap<String, Permission>,
    ) -> Result<Plan<String, Permission, Permission>> {
        let current = team
            .map(|t| index_by(t.permissions.clone(), |p| p.name.clone()))
            .unwrap_or_default();
        Ok(self.permissions.plan(desired, current, universe)?)
    }

    /// Converge the team's permissions to `desired`
    pub async fn sync_permissions(&self, team: &Team, desired: &[String]) -> Result<Outcome<String>> {
        let universe = self.permission_universe().await?;
        let plan = self.plan_permissions(Some(team), desired, &universe)?;
        self.apply_permissions(team.uuid, plan).await
    }

    /// Apply a permission plan to the team with the given UUID
    pub async fn apply_permissions(
        &self,
        team: Uuid,
        plan: Plan<String, Permission, Permission>,
    ) -> Result<Outcome<String>> {
        let client = self.client;
        let outcome = plan
            .apply(
                |p: Permission| async move { client.add_permission_to_team(&p.name, team).await },
                |p: Permission| async move { client.remove_permission_from_team(&p.name, team).await },
            )
            .await?;
        Ok(outcome)
    }

    /// Create a team and grant its permissions.
    ///
    /// Fails if a team with the same name exists. Permission names are
    /// resolved before the team is created.
    pub async fn create(&self, spec: &TeamSpec) -> Result<(Team, Outcome<String>)> {
        if let Some(existing) = self.find_by_name(&spec.name).await? {
            return Err(HandlerError::AlreadyExists {
                kind: "team",
                name: spec.name.clone(),
                uuid: existing.uuid,
            }
            .into());
        }

        let universe = self.permission_universe().await?;
        let plan = self.plan_permissions(None, &spec.permissions, &universe)?;

        let team = self.client.create_team(&spec.name).await?;
        tracing::info!("Created team {} ({})", team.name, team.uuid);

        let outcome = self.apply_permissions(team.uuid, plan).await?;
        let team = self.client.get_team(team.uuid).await?;
        Ok((team, outcome))
    }

    /// Read a team; `None` if the server no longer knows it
    pub async fn read(&self, uuid: Uuid) -> Result<Option<Team>> {
        match self.client.get_team(uuid).await {
            Ok(team) => Ok(Some(team)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Rename the team if needed and converge its permissions
    pub async fn update(&self, uuid: Uuid, spec: &TeamSpec) -> Result<(Team, Outcome<String>)> {
        let mut team = self.client.get_team(uuid).await?;
        if team.name != spec.name {
            tracing::info!("Renaming team {} to {}", team.name, spec.name);
            team.name = spec.name.clone();
            team = self.client.update_team(&team).await?;
        }

        let outcome = self.sync_permissions(&team, &spec.permissions).await?;
        let team = if outcome.is_noop() {
            team
        } else {
            self.client.get_team(uuid).await?
        };
        Ok((team, outcome))
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        self.client.delete_team(uuid).await?;
        tracing::info!("Deleted team {}", uuid);
        Ok(())
    }
}
