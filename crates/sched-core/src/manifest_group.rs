// SPDX-License-Identifier: MIT

//! Manifest groups: capacity/priority buckets.

use serde::{Deserialize, Serialize};

use crate::define_id;

define_id! {
    /// Identifies a [`ManifestGroup`].
    pub struct ManifestGroupId("grp-");
}

/// A capacity/priority bucket. Auto-created one-per-manifest when the
/// caller does not supply one (see [`ManifestGroup::default_for`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestGroup {
    pub id: ManifestGroupId,
    /// Unique group name.
    pub name: String,
    /// Signed priority; higher fires first within the dispatcher's ordering.
    pub priority: i32,
    /// Optional per-group concurrency ceiling.
    pub max_active_jobs: Option<u32>,
    pub is_enabled: bool,
}

impl ManifestGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ManifestGroupId::new(),
            name: name.into(),
            priority: 0,
            max_active_jobs: None,
            is_enabled: true,
        }
    }

    /// The implicit one-per-manifest group created when a caller upserts a
    /// manifest without naming a group.
    pub fn default_for(manifest_external_id: &str) -> Self {
        Self::new(format!("__default__{manifest_external_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_group_defaults_to_enabled_no_cap() {
        let g = ManifestGroup::new("etl");
        assert!(g.is_enabled);
        assert_eq!(g.max_active_jobs, None);
        assert_eq!(g.priority, 0);
    }

    #[test]
    fn default_for_is_scoped_to_the_manifest() {
        let g = ManifestGroup::default_for("extract-5");
        assert!(g.name.contains("extract-5"));
    }
}
