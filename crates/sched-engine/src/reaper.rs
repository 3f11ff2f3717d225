// SPDX-License-Identifier: MIT

//! Retry / dead-letter reaper: a phase of the evaluator cycle (not a
//! standalone background task). Promotes a manifest to a dead-letter once
//! its cumulative failure count reaches `max_retries`, provided it doesn't
//! already have one open.

use std::collections::HashSet;

use sched_core::dead_letter::DeadLetter;
use sched_core::manifest::ManifestId;
use sched_core::schedule::ManifestCandidate;
use sched_core::Event;
use sched_store::Store;

use crate::error::EngineResult;

/// Dead-letters every candidate past its retry budget, flushing after
/// each write so a crash mid-reap never loses one. Idempotent on retry:
/// `has_awaiting_dead_letter` is checked first, so re-running this against
/// state that already reflects a prior partial reap creates nothing new.
pub fn reap(
    store: &mut Store,
    candidates: &[ManifestCandidate],
    now_epoch_ms: u64,
) -> EngineResult<HashSet<ManifestId>> {
    let mut newly_dead_lettered = HashSet::new();
    for candidate in candidates {
        if candidate.has_awaiting_dead_letter {
            continue;
        }
        if candidate.failed_count < candidate.manifest.max_retries {
            continue;
        }
        let dead_letter = DeadLetter::new(
            candidate.manifest.id,
            "max retries exceeded",
            candidate.failed_count,
            now_epoch_ms,
        );
        store.append(Event::DeadLetterCreated { dead_letter })?;
        store.flush()?;
        newly_dead_lettered.insert(candidate.manifest.id);
    }
    Ok(newly_dead_lettered)
}
