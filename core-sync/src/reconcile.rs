//! # Reconciliation
//!
//! Combines the [`ChangeSet`] engine with the configured
//! [`ModificationPolicy`] list to produce the final classification.
//!
//! ## Duplicate identities
//!
//! Both inputs are collapsed into identity sets before diffing:
//! - **Local** duplicates (overlapping roots) keep the first occurrence.
//! - **Remote** duplicates keep the newest entry. The older copies are
//!   returned in [`Reconciliation::superseded`] so the caller can delete them.
//!   They appear when a run stops between uploading a modified file and
//!   deleting its previous archive.

use crate::changeset::ChangeSet;
use crate::policy::{LastModifiedDiffer, ModificationPolicy};
use crate::record::Timestamped;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, warn};

/// Final classification of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation<T> {
    pub new: Vec<T>,
    pub deleted: Vec<T>,
    /// `(local, remote)` pairs flagged by at least one policy
    pub modified: Vec<(T, T)>,
    /// Older remote entries shadowed by a newer entry with the same identity
    pub superseded: Vec<T>,
}

impl<T> Reconciliation<T> {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty()
            && self.deleted.is_empty()
            && self.modified.is_empty()
            && self.superseded.is_empty()
    }
}

pub struct ReconciliationRunner<T> {
    policies: Vec<Arc<dyn ModificationPolicy<T>>>,
}

impl<T> ReconciliationRunner<T>
where
    T: Eq + Hash + Ord + Clone + Debug + Timestamped + 'static,
{
    pub fn new(policies: Vec<Arc<dyn ModificationPolicy<T>>>) -> Self {
        Self { policies }
    }

    /// Runner with only [`LastModifiedDiffer`]
    pub fn with_default_policies() -> Self {
        Self::new(vec![Arc::new(LastModifiedDiffer)])
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.policies.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn reconcile<L, R>(&self, local: L, remote: R) -> Reconciliation<T>
    where
        L: IntoIterator<Item = T>,
        R: IntoIterator<Item = T>,
    {
        let local = collect_local(local);
        let (remote, superseded) = collect_remote(remote);

        let changes = ChangeSet::compute(&local, &remote);

        let modified = changes
            .maybe_modified
            .into_iter()
            .filter(|(l, r)| {
                match self.policies.iter().find(|policy| policy.is_modified(l, r)) {
                    Some(policy) => {
                        debug!(local = ?l, policy = policy.name(), "Pair flagged as modified");
                        true
                    }
                    None => false,
                }
            })
            .collect();

        Reconciliation {
            new: changes.new.into_iter().collect(),
            deleted: changes.deleted.into_iter().collect(),
            modified,
            superseded,
        }
    }
}

fn collect_local<T>(items: impl IntoIterator<Item = T>) -> HashSet<T>
where
    T: Eq + Hash + Debug,
{
    let mut set = HashSet::new();
    for item in items {
        if set.contains(&item) {
            warn!(record = ?item, "Duplicate local identity ignored");
            continue;
        }
        set.insert(item);
    }
    set
}

fn collect_remote<T>(items: impl IntoIterator<Item = T>) -> (HashSet<T>, Vec<T>)
where
    T: Eq + Hash + Ord + Debug + Timestamped,
{
    let mut set: HashSet<T> = HashSet::new();
    let mut superseded = Vec::new();

    for item in items {
        match set.take(&item) {
            // Later entries win ties: they were appended by a later upload.
            Some(existing) if item.last_modified() >= existing.last_modified() => {
                warn!(kept = ?item, dropped = ?existing, "Duplicate remote identity");
                superseded.push(existing);
                set.insert(item);
            }
            Some(existing) => {
                warn!(kept = ?existing, dropped = ?item, "Duplicate remote identity");
                superseded.push(item);
                set.insert(existing);
            }
            None => {
                set.insert(item);
            }
        }
    }

    superseded.sort();
    (set, superseded)
}
