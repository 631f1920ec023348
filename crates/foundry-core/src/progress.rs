//! Progress derivation: weighted overall progress, current phase, and
//! completion estimation.
//!
//! These are pure functions over a [`Session`] snapshot and a validated
//! weight table. They never mutate state; the aggregator applies their
//! results under the per-session lock.
//!
//! # Design Principles
//!
//! - Overall progress is the weight-blended sum of per-phase progress;
//!   with monotonic phase progress and fixed weights it is monotonic by
//!   construction.
//! - The completion estimate is a linear extrapolation
//!   (`elapsed / overall * 100`) clamped to a configured horizon so that
//!   near-zero progress cannot produce a runaway estimate.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use foundry_types::{Phase, PhaseStatus, Session};

/// Compute the weighted overall progress of a session (0-100).
///
/// `weights` must be a validated table covering every phase (see
/// `PipelineConfig::validate`); a missing entry contributes zero.
pub fn overall_progress(session: &Session, weights: &BTreeMap<Phase, f64>) -> f64 {
    let mut total = 0.0_f64;
    for phase in Phase::ALL {
        let progress = session.phase(phase).map_or(0.0, |state| state.progress);
        let weight = weights.get(&phase).copied().unwrap_or(0.0);
        total += progress * weight;
    }
    total.clamp(0.0, 100.0)
}

/// The lowest-ordered phase that is not yet completed.
///
/// When every phase is completed, the final phase is returned so the
/// field stays meaningful on finished sessions.
pub fn current_phase(session: &Session) -> Phase {
    Phase::ALL
        .into_iter()
        .find(|phase| {
            session
                .phase(*phase)
                .is_none_or(|state| state.status != PhaseStatus::Completed)
        })
        .unwrap_or(Phase::Assessment)
}

/// Linearly extrapolate the completion time of a session.
///
/// Total expected duration is `elapsed / max(overall, 1) * 100`, clamped
/// to `max_horizon_secs`, and added to the session start time. Returns
/// `None` until any wall-clock time has elapsed, since zero elapsed
/// time carries no information.
pub fn estimate_completion(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    overall: f64,
    max_horizon_secs: u64,
) -> Option<DateTime<Utc>> {
    let elapsed_secs = (now - start).num_seconds();
    if elapsed_secs <= 0 {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let elapsed = elapsed_secs as f64;
    let total = elapsed / overall.max(1.0) * 100.0;

    #[allow(clippy::cast_precision_loss)]
    let horizon = max_horizon_secs as f64;
    let clamped = total.min(horizon);

    #[allow(clippy::cast_possible_truncation)]
    let total_secs = clamped.round() as i64;
    start.checked_add_signed(Duration::seconds(total_secs))
}

/// Seconds remaining until an estimated completion, never negative.
pub fn remaining_secs(estimated: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let remaining = (estimated - now).num_seconds();
    u64::try_from(remaining).unwrap_or(0)
}
