//! Modification policies decide whether an identity-matched pair changed.
//!
//! Policies only ever see `maybe_modified` pairs. Several can be configured;
//! a pair counts as modified when any one of them says so.

use crate::record::Timestamped;

pub trait ModificationPolicy<R>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Whether `local` should replace `remote`
    fn is_modified(&self, local: &R, remote: &R) -> bool;
}

/// Flags a pair when the local copy is strictly newer than the archived one
#[derive(Debug, Clone, Copy, Default)]
pub struct LastModifiedDiffer;

impl<R: Timestamped> ModificationPolicy<R> for LastModifiedDiffer {
    fn name(&self) -> &str {
        "last_modified"
    }

    fn is_modified(&self, local: &R, remote: &R) -> bool {
        local.last_modified() > remote.last_modified()
    }
}
