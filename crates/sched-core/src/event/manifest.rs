// SPDX-License-Identifier: MIT

//! Manifest/group event helpers

use super::Event;

pub(super) fn log_summary(event: &Event) -> String {
    match event {
        Event::ManifestUpserted { manifest } => {
            format!("manifest upserted external_id={}", manifest.external_id)
        }
        Event::ManifestEnabled { manifest_id } => format!("manifest enabled id={manifest_id}"),
        Event::ManifestDisabled { manifest_id } => format!("manifest disabled id={manifest_id}"),
        Event::ManifestPruned { external_id, .. } => {
            format!("manifest pruned external_id={external_id}")
        }
        Event::ManifestGroupUpserted { group } => {
            format!("manifest group upserted name={}", group.name)
        }
        Event::ManifestRanSuccessfully { manifest_id, at_ms } => {
            format!("manifest ran successfully id={manifest_id} at_ms={at_ms}")
        }
        _ => unreachable!("not a manifest event"),
    }
}
