//! # Change Set
//!
//! Pure set arithmetic over two identity-deduplicated collections.
//!
//! ```text
//! new            = local − remote
//! deleted        = remote − local
//! maybe_modified = { (l, r) : l ∈ local, r ∈ remote, l == r }
//! ```
//!
//! The element type decides what identity means; for [`FileRecord`](crate::record::FileRecord)
//! it is the path. Pairing uses a hash lookup, so the cost is O(n + m).

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet<T: Ord> {
    /// Present locally with no remote counterpart
    pub new: BTreeSet<T>,
    /// Present remotely with no local counterpart
    pub deleted: BTreeSet<T>,
    /// Identity-matched `(local, remote)` pairs, ordered by identity
    pub maybe_modified: Vec<(T, T)>,
}

impl<T> ChangeSet<T>
where
    T: Eq + Hash + Ord + Clone,
{
    pub fn compute(local: &HashSet<T>, remote: &HashSet<T>) -> Self {
        let mut new = BTreeSet::new();
        let mut maybe_modified = Vec::new();

        for item in local {
            match remote.get(item) {
                Some(counterpart) => maybe_modified.push((item.clone(), counterpart.clone())),
                None => {
                    new.insert(item.clone());
                }
            }
        }

        let deleted = remote
            .iter()
            .filter(|item| !local.contains(*item))
            .cloned()
            .collect();

        maybe_modified.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            new,
            deleted,
            maybe_modified,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.deleted.is_empty() && self.maybe_modified.is_empty()
    }
}
