//! Declarative manifest
//!
//! A manifest lists the desired teams, OIDC groups, repositories and config
//! properties. [`Applier`] converges the server onto it in that order, so a
//! group can map onto a team created earlier in the same run.

use super::{
    ConfigPropertyHandler, ConfigPropertySpec, HandlerError, OidcGroupHandler, OidcGroupSpec,
    RepositoryHandler, RepositorySpec, TeamHandler, TeamSpec,
};
use crate::dtrack::models::Team;
use crate::dtrack::DtrackClient;
use crate::sync::{Edit, EditOp, Outcome, Plan};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Property type whose values the server never returns in clear text
const ENCRYPTED_TYPE: &str = "ENCRYPTEDSTRING";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<TeamSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub oidc_groups: Vec<OidcGroupSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositorySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_properties: Vec<ConfigPropertySpec>,
}

fn check_unique(kind: &'static str, keys: impl IntoIterator<Item = String>) -> Result<(), HandlerError> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key.clone()) {
            return Err(HandlerError::Duplicate { kind, key });
        }
    }
    Ok(())
}

impl Manifest {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(content).context("Failed to parse manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize manifest")
    }

    /// Reject manifests that name the same object twice
    pub fn validate(&self) -> Result<(), HandlerError> {
        check_unique("team", self.teams.iter().map(|t| t.name.clone()))?;
        check_unique("OIDC group", self.oidc_groups.iter().map(|g| g.name.clone()))?;
        check_unique("repository", self.repositories.iter().map(RepositorySpec::key))?;
        check_unique("config property", self.config_properties.iter().map(ConfigPropertySpec::id))?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
            && self.oidc_groups.is_empty()
            && self.repositories.is_empty()
            && self.config_properties.is_empty()
    }

    /// Snapshot the server's current state as a manifest.
    ///
    /// Encrypted properties and repository passwords are left out since the
    /// server does not return them.
    pub async fn export(client: &DtrackClient) -> Result<Self> {
        let team_handler = TeamHandler::new(client);
        let group_handler = OidcGroupHandler::new(client);
        let repository_handler = RepositoryHandler::new(client);
        let property_handler = ConfigPropertyHandler::new(client);

        let (teams, groups, repositories, properties) = futures::try_join!(
            team_handler.list(),
            group_handler.list(),
            repository_handler.list(),
            property_handler.list(),
        )?;
        tracing::debug!(
            "Exporting {} teams, {} OIDC groups, {} repositories, {} config properties",
            teams.len(),
            groups.len(),
            repositories.len(),
            properties.len()
        );

        let mut team_specs: Vec<TeamSpec> = teams.iter().map(TeamSpec::from).collect();
        team_specs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut group_specs: Vec<OidcGroupSpec> = groups
            .iter()
            .map(|group| {
                let mut mapped: Vec<String> = teams
                    .iter()
                    .filter(|t| t.mapping_for(group.uuid).is_some())
                    .map(|t| t.name.clone())
                    .collect();
                mapped.sort();
                OidcGroupSpec {
                    name: group.name.clone(),
                    teams: mapped,
                }
            })
            .collect();
        group_specs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut repository_specs: Vec<RepositorySpec> =
            repositories.iter().map(RepositorySpec::from).collect();
        repository_specs.sort_by_key(RepositorySpec::key);

        let mut property_specs: Vec<ConfigPropertySpec> = properties
            .iter()
            .filter(|p| p.property_type != ENCRYPTED_TYPE)
            .map(ConfigPropertySpec::from)
            .collect();
        property_specs.sort_by_key(ConfigPropertySpec::id);

        Ok(Self {
            teams: team_specs,
            oidc_groups: group_specs,
            repositories: repository_specs,
            config_properties: property_specs,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Add,
    Remove,
}

impl Action {
    fn symbol(&self) -> char {
        match self {
            Action::Create | Action::Add => '+',
            Action::Update => '~',
            Action::Remove => '-',
        }
    }
}

impl From<EditOp> for Action {
    fn from(op: EditOp) -> Self {
        match op {
            EditOp::Add => Action::Add,
            EditOp::Remove => Action::Remove,
        }
    }
}

/// One change made (or planned, in a dry run) by [`Applier`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub action: Action,
    pub kind: String,
    pub key: String,
    /// Object owning the relation, for `add` and `remove`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl Change {
    fn object(action: Action, kind: &str, key: impl Into<String>) -> Self {
        Self {
            action,
            kind: kind.to_string(),
            key: key.into(),
            anchor: None,
        }
    }

    fn relation(edit: &Edit, kind: &str, anchor: &str) -> Self {
        Self {
            action: edit.op.into(),
            kind: kind.to_string(),
            key: edit.key.clone(),
            anchor: Some(anchor.to_string()),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action.symbol(), self.kind, self.key)?;
        if let Some(anchor) = &self.anchor {
            write!(f, " ({anchor})")?;
        }
        Ok(())
    }
}

/// An apply that failed after writing to the server
#[derive(Debug, Error)]
#[error("apply stopped after {count} change(s)", count = .applied.len())]
pub struct ApplyError {
    /// Changes made before the failure, in order
    pub applied: Vec<Change>,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub dry_run: bool,
    pub changes: Vec<Change>,
    pub completed_at: String,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

fn planned<U, C>(plan: &Plan<String, U, C>, kind: &str, anchor: &str) -> Vec<Change> {
    plan.edits().iter().map(|e| Change::relation(e, kind, anchor)).collect()
}

fn applied(outcome: &Outcome<String>, kind: &str, anchor: &str) -> Vec<Change> {
    let adds = outcome.added.iter().map(|k| Edit::add(k.clone()));
    let removes = outcome.removed.iter().map(|k| Edit::remove(k.clone()));
    adds.chain(removes).map(|e| Change::relation(&e, kind, anchor)).collect()
}

/// Converges the server onto a [`Manifest`].
///
/// Objects the manifest does not mention are left alone; relations of the
/// objects it does mention are converged exactly.
pub struct Applier<'a> {
    client: &'a DtrackClient,
    dry_run: bool,
}

impl<'a> Applier<'a> {
    pub fn new(client: &'a DtrackClient) -> Self {
        Self { client, dry_run: false }
    }

    /// Plan only; nothing is written to the server
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Apply every section of the manifest.
    ///
    /// If a write fails after others went through, the error is an
    /// [`ApplyError`] listing the changes already made.
    pub async fn apply(&self, manifest: &Manifest) -> Result<ApplyReport> {
        manifest.validate()?;
        tracing::info!("Applying manifest (dry run: {})", self.dry_run);

        let mut changes = Vec::new();
        if let Err(source) = self.apply_sections(manifest, &mut changes).await {
            if self.dry_run {
                return Err(source);
            }
            tracing::error!("Apply stopped after {} changes: {:#}", changes.len(), source);
            return Err(ApplyError {
                applied: changes,
                source,
            }
            .into());
        }

        tracing::info!("Manifest applied with {} changes", changes.len());
        Ok(ApplyReport {
            dry_run: self.dry_run,
            changes,
            completed_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn apply_sections(&self, manifest: &Manifest, changes: &mut Vec<Change>) -> Result<()> {
        let pending_teams = self.apply_teams(&manifest.teams, changes).await?;
        self.apply_oidc_groups(&manifest.oidc_groups, &pending_teams, changes)
            .await?;
        self.apply_repositories(&manifest.repositories, changes).await?;
        self.apply_config_properties(&manifest.config_properties, changes)
            .await
    }

    /// Returns the names of teams that would be created in a dry run
    async fn apply_teams(&self, specs: &[TeamSpec], changes: &mut Vec<Change>) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        if specs.is_empty() {
            return Ok(pending);
        }

        let handler = TeamHandler::new(self.client);
        let existing = handler.list_by_name().await?;
        let universe = handler.permission_universe().await?;

        for spec in specs {
            let anchor = format!("team {}", spec.name);
            match existing.get(&spec.name) {
                None if self.dry_run => {
                    let plan = handler.plan_permissions(None, &spec.permissions, &universe)?;
                    changes.push(Change::object(Action::Create, "team", &spec.name));
                    changes.extend(planned(&plan, "permission", &anchor));
                    pending.push(spec.name.clone());
                }
                None => {
                    let plan = handler.plan_permissions(None, &spec.permissions, &universe)?;
                    let team = self.client.create_team(&spec.name).await?;
                    tracing::info!("Created team {} ({})", team.name, team.uuid);
                    changes.push(Change::object(Action::Create, "team", &spec.name));
                    let outcome = handler.apply_permissions(team.uuid, plan).await?;
                    changes.extend(applied(&outcome, "permission", &anchor));
                }
                Some(team) => {
                    let plan = handler.plan_permissions(Some(team), &spec.permissions, &universe)?;
                    if self.dry_run {
                        changes.extend(planned(&plan, "permission", &anchor));
                    } else {
                        let outcome = handler.apply_permissions(team.uuid, plan).await?;
                        changes.extend(applied(&outcome, "permission", &anchor));
                    }
                }
            }
        }
        Ok(pending)
    }

    async fn apply_oidc_groups(
        &self,
        specs: &[OidcGroupSpec],
        pending_teams: &[String],
        changes: &mut Vec<Change>,
    ) -> Result<()> {
        if specs.is_empty() {
            return Ok(());
        }

        let handler = OidcGroupHandler::new(self.client);
        let existing = handler.list_by_name().await?;
        let mut universe = handler.team_universe().await?;
        for name in pending_teams {
            universe.entry(name.clone()).or_insert_with(|| Team {
                uuid: Uuid::nil(),
                name: name.clone(),
                permissions: vec![],
                mapped_oidc_groups: vec![],
            });
        }

        for spec in specs {
            let anchor = format!("OIDC group {}", spec.name);
            match existing.get(&spec.name) {
                None if self.dry_run => {
                    let plan = handler.plan_teams(None, &spec.teams, &universe).await?;
                    changes.push(Change::object(Action::Create, "OIDC group", &spec.name));
                    changes.extend(planned(&plan, "team", &anchor));
                }
                None => {
                    let plan = handler.plan_teams(None, &spec.teams, &universe).await?;
                    let group = self.client.create_oidc_group(&spec.name).await?;
                    tracing::info!("Created OIDC group {} ({})", group.name, group.uuid);
                    changes.push(Change::object(Action::Create, "OIDC group", &spec.name));
                    let outcome = handler.apply_teams(group.uuid, plan).await?;
                    changes.extend(applied(&outcome, "team", &anchor));
                }
                Some(group) => {
                    let plan = handler.plan_teams(Some(group), &spec.teams, &universe).await?;
                    if self.dry_run {
                        changes.extend(planned(&plan, "team", &anchor));
                    } else {
                        let outcome = handler.apply_teams(group.uuid, plan).await?;
                        changes.extend(applied(&outcome, "team", &anchor));
                    }
                }
            }
        }
        Ok(())
    }

    async fn apply_repositories(&self, specs: &[RepositorySpec], changes: &mut Vec<Change>) -> Result<()> {
        if specs.is_empty() {
            return Ok(());
        }

        let handler = RepositoryHandler::new(self.client);
        let existing = handler.list_by_key().await?;

        for spec in specs {
            let key = spec.key();
            match existing.get(&key) {
                None => {
                    if !self.dry_run {
                        handler.create(spec).await?;
                    }
                    changes.push(Change::object(Action::Create, "repository", key));
                }
                Some(repo) if spec.differs_from(repo) => {
                    if !self.dry_run {
                        handler.update(repo, spec).await?;
                    }
                    changes.push(Change::object(Action::Update, "repository", key));
                }
                Some(_) => tracing::debug!("Repository {} is up to date", key),
            }
        }
        Ok(())
    }

    async fn apply_config_properties(
        &self,
        specs: &[ConfigPropertySpec],
        changes: &mut Vec<Change>,
    ) -> Result<()> {
        if specs.is_empty() {
            return Ok(());
        }

        let handler = ConfigPropertyHandler::new(self.client);
        let existing = handler.list_by_id().await?;

        // Properties cannot be created, so resolve all of them before updating any.
        let mut resolved = Vec::with_capacity(specs.len());
        for spec in specs {
            let id = spec.id();
            let Some(current) = existing.get(&id) else {
                return Err(HandlerError::NotFound {
                    kind: "config property",
                    key: id,
                }
                .into());
            };
            resolved.push((spec, current, id));
        }

        for (spec, current, id) in resolved {
            if !spec.differs_from(current) {
                continue;
            }
            if !self.dry_run {
                handler.update_existing(current, spec).await?;
            }
            changes.push(Change::object(Action::Update, "config property", id));
        }
        Ok(())
    }
}
