// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure priority scoring function (§4.C). No shared state; safe to call
//! from both the Admission Pipeline and the Admin Reconciler.

/// The priority term dominates any plausible timestamp term for priorities
/// within `[0, 10^15]` (§4.C).
const PRIORITY_SCALE: i64 = 1_000_000_000_000_000;

/// Inputs to the scoring function, already resolved from a job record.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub priority: i64,
    pub workflow_priority: Option<i64>,
    pub created_at_ms: i64,
    pub workflow_datetime_ms: Option<i64>,
}

impl ScoreInputs {
    pub fn effective_priority(&self) -> i64 {
        self.workflow_priority.unwrap_or(self.priority)
    }

    pub fn effective_time_ms(&self) -> i64 {
        self.workflow_datetime_ms.unwrap_or(self.created_at_ms)
    }
}

/// `score = effective_priority * 10^15 - floor(effective_time_ms / 1000)`
///
/// Consumed highest-score-first: strict priority dominance, FIFO within a
/// priority tier (§4.C, §8 invariants 2-4).
pub fn score(inputs: &ScoreInputs) -> i64 {
    let effective_priority = inputs.effective_priority();
    let effective_time_ms = inputs.effective_time_ms();
    effective_priority * PRIORITY_SCALE - effective_time_ms.div_euclid(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(priority: i64, created_at_ms: i64) -> ScoreInputs {
        ScoreInputs {
            priority,
            workflow_priority: None,
            created_at_ms,
            workflow_datetime_ms: None,
        }
    }

    #[test]
    fn score_matches_formula() {
        let s = score(&inputs(50, 1_700_000_000_000));
        assert_eq!(
            s,
            50 * PRIORITY_SCALE - 1_700_000_000_000i64.div_euclid(1000)
        );
    }

    #[test]
    fn workflow_priority_and_datetime_override_job_fields() {
        let inputs = ScoreInputs {
            priority: 10,
            workflow_priority: Some(90),
            created_at_ms: 1_700_000_000_000,
            workflow_datetime_ms: Some(1_600_000_000_000),
        };
        assert_eq!(inputs.effective_priority(), 90);
        assert_eq!(inputs.effective_time_ms(), 1_600_000_000_000);
    }

    // S1 — Priority dominance.
    #[test]
    fn higher_priority_wins_by_at_least_the_guaranteed_margin() {
        let low = score(&inputs(10, 1_700_000_000_000));
        let high = score(&inputs(90, 1_700_000_000_100));
        assert!(high > low);
        assert!(high - low >= 80 * PRIORITY_SCALE - 1);
    }

    // S2 — FIFO within tier.
    #[test]
    fn earlier_submission_wins_within_same_priority_tier() {
        let first = ScoreInputs {
            priority: 50,
            workflow_priority: None,
            created_at_ms: 0,
            workflow_datetime_ms: Some(1_700_000_000_000),
        };
        let second = ScoreInputs {
            priority: 50,
            workflow_priority: None,
            created_at_ms: 0,
            workflow_datetime_ms: Some(1_700_000_005_000),
        };
        assert!(score(&first) > score(&second));
    }

    #[test]
    fn invariant_any_two_pending_jobs_order_by_priority_then_recency() {
        let a = inputs(70, 1_700_000_000_000);
        let b = inputs(30, 1_700_000_000_000);
        assert!(score(&a) > score(&b));

        let older = inputs(50, 1_000);
        let newer = inputs(50, 2_000);
        assert!(score(&older) > score(&newer));
    }
}
