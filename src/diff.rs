//! Diff engine
//!
//! Compares a source and a destination tree map into three disjoint, sorted
//! path sets. Directories never reach a tree map, so a path that changes
//! kind between sides surfaces as delete + add; the applier's delete-first
//! order resolves the name collision.

use crate::tree::{FileMeta, TreeMap};

/// How "has this file changed" is decided for paths present on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangePolicy {
    /// Size mismatch only. Authoritative: device and host clocks are not
    /// assumed comparable.
    #[default]
    SizeOnly,
    /// Size mismatch, or destination strictly older than source. Only sound
    /// when both sides share a trusted clock.
    SizeAndMtime,
}

impl ChangePolicy {
    pub fn differs(&self, source: &FileMeta, dest: &FileMeta) -> bool {
        match self {
            ChangePolicy::SizeOnly => source.size != dest.size,
            ChangePolicy::SizeAndMtime => source.size != dest.size || dest.mtime < source.mtime,
        }
    }
}

/// The three-way partition of changed paths between two tree maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffPlan {
    /// Keys only in the destination, sorted ascending.
    pub to_delete: Vec<String>,
    /// Keys only in the source, sorted ascending.
    pub to_add: Vec<String>,
    /// Keys in both whose metadata differs under the policy, sorted ascending.
    pub to_update: Vec<String>,
}

impl DiffPlan {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty() && self.to_update.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_delete.len() + self.to_add.len() + self.to_update.len()
    }
}

/// Compute the sync plan turning `dest` into `source`.
///
/// Symmetry holds for any two maps: `diff(a, b).to_delete == diff(b, a).to_add`
/// and vice versa.
pub fn diff(source: &TreeMap, dest: &TreeMap, policy: ChangePolicy) -> DiffPlan {
    let mut plan = DiffPlan::default();

    for (path, dest_meta) in dest {
        match source.get(path) {
            None => plan.to_delete.push(path.clone()),
            Some(source_meta) => {
                if policy.differs(source_meta, dest_meta) {
                    plan.to_update.push(path.clone());
                }
            }
        }
    }
    for path in source.keys() {
        if !dest.contains_key(path) {
            plan.to_add.push(path.clone());
        }
    }

    // BTreeMap iteration is already ascending; the three sets inherit it.
    plan
}
