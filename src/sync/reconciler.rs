//! Set Reconciler
//!
//! Converges one side of a many-to-many relation to a desired key set.
//!
//! A pass has two phases. Planning diffs the desired keys against the current
//! edges and resolves every key to add against the universe of target items;
//! it performs no I/O and fails with [`SyncError::NotFound`] before anything
//! is mutated. Applying runs the adds (in desired order) and then the removes
//! (in key order) one call at a time, halting at the first failure with a
//! [`SyncError::Mutation`] that carries the progress made so far.
//!
//! No lock is held between reading the current edges and applying the plan.
//! Callers reconciling the same anchor concurrently must serialize themselves.

use super::error::{Edit, Progress, SyncError};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;

/// Edits computed for one reconciliation pass
#[derive(Debug, Clone)]
pub struct Plan<K, U, C> {
    kind: String,
    adds: Vec<(K, U)>,
    removes: Vec<(K, C)>,
}

/// What a completed pass changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<K> {
    pub added: Vec<K>,
    pub removed: Vec<K>,
}

impl<K> Outcome<K> {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn mutations(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

impl<K, U, C> Plan<K, U, C>
where
    K: Display,
{
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_noop(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }

    pub fn add_keys(&self) -> impl Iterator<Item = &K> {
        self.adds.iter().map(|(k, _)| k)
    }

    pub fn remove_keys(&self) -> impl Iterator<Item = &K> {
        self.removes.iter().map(|(k, _)| k)
    }

    /// All edits in application order
    pub fn edits(&self) -> Vec<Edit> {
        self.add_keys()
            .map(|k| Edit::add(k.to_string()))
            .chain(self.remove_keys().map(|k| Edit::remove(k.to_string())))
            .collect()
    }

    /// Apply the plan through the injected edge operations.
    ///
    /// Adds run before removes. The first failing call stops the pass.
    pub async fn apply<A, AFut, AOut, R, RFut>(
        self,
        mut add_edge: A,
        mut remove_edge: R,
    ) -> Result<Outcome<K>, SyncError>
    where
        A: FnMut(U) -> AFut,
        AFut: Future<Output = anyhow::Result<AOut>>,
        R: FnMut(C) -> RFut,
        RFut: Future<Output = anyhow::Result<()>>,
    {
        let edits = self.edits();
        let kind = self.kind;
        let mut done = 0;

        let fail = |done: usize, source: anyhow::Error| SyncError::Mutation {
            kind: kind.clone(),
            failed: edits[done].clone(),
            progress: Progress {
                applied: edits[..done].to_vec(),
                not_attempted: edits[done + 1..].to_vec(),
            },
            source,
        };

        let mut added = Vec::with_capacity(self.adds.len());
        for (key, target) in self.adds {
            tracing::info!("Adding {} {}", kind, key);
            if let Err(e) = add_edge(target).await {
                tracing::error!("Failed to add {} {}: {:#}", kind, key, e);
                return Err(fail(done, e));
            }
            added.push(key);
            done += 1;
        }

        let mut removed = Vec::with_capacity(self.removes.len());
        for (key, edge) in self.removes {
            tracing::info!("Removing {} {}", kind, key);
            if let Err(e) = remove_edge(edge).await {
                tracing::error!("Failed to remove {} {}: {:#}", kind, key, e);
                return Err(fail(done, e));
            }
            removed.push(key);
            done += 1;
        }

        Ok(Outcome { added, removed })
    }
}

/// Generic reconciliation routine for one relation kind
#[derive(Debug, Clone)]
pub struct SetReconciler {
    kind: String,
}

impl SetReconciler {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Diff desired keys against current edges.
    ///
    /// Current edges whose key is desired are kept; the rest are removed.
    /// Every desired key without an edge must resolve in `universe`, otherwise
    /// the first unresolved key (in desired order) is reported and no plan is
    /// produced. Duplicate desired keys count once.
    pub fn plan<K, U, C>(
        &self,
        desired: &[K],
        current: HashMap<K, C>,
        universe: &HashMap<K, U>,
    ) -> Result<Plan<K, U, C>, SyncError>
    where
        K: Eq + Hash + Ord + Clone + Display,
        U: Clone,
    {
        let mut remaining = current;
        let mut seen = HashSet::with_capacity(desired.len());
        let mut adds = Vec::new();

        for key in desired {
            if !seen.insert(key) {
                continue;
            }
            if remaining.remove(key).is_some() {
                continue;
            }
            let Some(target) = universe.get(key) else {
                return Err(SyncError::NotFound {
                    kind: self.kind.clone(),
                    key: key.to_string(),
                });
            };
            adds.push((key.clone(), target.clone()));
        }

        let mut removes: Vec<(K, C)> = remaining.into_iter().collect();
        removes.sort_by(|a, b| a.0.cmp(&b.0));

        tracing::debug!(
            "{} plan: {} to add, {} to remove",
            self.kind,
            adds.len(),
            removes.len()
        );

        Ok(Plan {
            kind: self.kind.clone(),
            adds,
            removes,
        })
    }

    /// Plan and apply in one step
    pub async fn reconcile<K, U, C, A, AFut, AOut, R, RFut>(
        &self,
        desired: &[K],
        current: HashMap<K, C>,
        universe: &HashMap<K, U>,
        add_edge: A,
        remove_edge: R,
    ) -> Result<Outcome<K>, SyncError>
    where
        K: Eq + Hash + Ord + Clone + Display,
        U: Clone,
        A: FnMut(U) -> AFut,
        AFut: Future<Output = anyhow::Result<AOut>>,
        R: FnMut(C) -> RFut,
        RFut: Future<Output = anyhow::Result<()>>,
    {
        self.plan(desired, current, universe)?
            .apply(add_edge, remove_edge)
            .await
    }
}
