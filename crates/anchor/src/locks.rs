use crate::resolver::{AnchorResolver, MatchTier};
use log::debug;
use serde::Serialize;
use suggest_protocol::LockedSpan;

/// Where a locked span currently lives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatedLock {
    pub id: String,
    pub start: usize,
    pub end: usize,
    pub tier: MatchTier,
}

impl LocatedLock {
    #[must_use]
    pub const fn overlaps(&self, start: usize, end: usize) -> bool {
        start < self.end && self.start < end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResolution {
    /// Locks that still resolve, in input order
    pub located: Vec<LocatedLock>,
    /// Ids of locks whose text is gone
    pub orphaned: Vec<String>,
}

impl AnchorResolver {
    /// Re-resolve every lock against `text`.
    #[must_use]
    pub fn resolve_locks(&self, text: &str, locks: &[LockedSpan]) -> LockResolution {
        let mut resolution = LockResolution::default();
        for lock in locks {
            match self.resolve(text, &lock.anchor) {
                Some(found) => resolution.located.push(LocatedLock {
                    id: lock.id.clone(),
                    start: found.start,
                    end: found.end,
                    tier: found.tier,
                }),
                None => {
                    debug!("locked span {} no longer resolves", lock.id);
                    resolution.orphaned.push(lock.id.clone());
                }
            }
        }
        resolution
    }
}

/// [`AnchorResolver::resolve_locks`] with the default configuration.
#[must_use]
pub fn resolve_locked_spans(text: &str, locks: &[LockedSpan]) -> LockResolution {
    AnchorResolver::default().resolve_locks(text, locks)
}
