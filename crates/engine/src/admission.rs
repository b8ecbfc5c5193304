// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Admission Pipeline (§4.G): turns a submission payload into a
//! persisted, scored, fanned-out job.

use std::sync::Arc;

use jobmux_core::{Clock, IdGen, Job, JobId, JobSubmission, ScoreInputs};
use jobmux_store::{keys, StoreAdapter};

use crate::error::EngineError;
use crate::fanout::FanOutEngine;

/// Matches the body-size ceiling in §6.1. Enforced here rather than left to
/// surface as a late store failure.
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

pub struct AdmissionPipeline {
    store: Arc<dyn StoreAdapter>,
    fanout: Arc<FanOutEngine>,
    id_gen: Arc<dyn IdGen>,
    clock: Arc<dyn Clock>,
}

impl AdmissionPipeline {
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        fanout: Arc<FanOutEngine>,
        id_gen: Arc<dyn IdGen>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            fanout,
            id_gen,
            clock,
        }
    }

    /// Runs the six-step flow from §4.G: assign id, construct the record,
    /// persist it, score and enqueue it, emit `job_submitted`, return the id.
    pub async fn submit(&self, submission: JobSubmission) -> Result<JobId, EngineError> {
        let payload_size = submission.payload.to_string().len();
        if payload_size > MAX_PAYLOAD_BYTES {
            return Err(EngineError::BadRequest(format!(
                "submission payload of {payload_size} bytes exceeds the {MAX_PAYLOAD_BYTES}-byte limit"
            )));
        }

        let id = JobId::new(self.id_gen.next());
        let job = Job::new(id.clone(), &submission, &*self.clock);

        let fields = job.to_hash_fields();
        let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.store.put_hash_fields(&keys::job_key(id.as_str()), &borrowed).await?;

        let created_at_ms = self.clock.now_ms();
        let score_inputs = ScoreInputs {
            priority: job.priority,
            workflow_priority: job.workflow_priority,
            created_at_ms,
            workflow_datetime_ms: job.workflow_datetime,
        };
        let score = jobmux_core::score(&score_inputs);
        self.store
            .add_to_sorted_set(keys::PENDING_SET, id.as_str(), score)
            .await?;

        self.fanout
            .dispatch(jobmux_core::Event::JobSubmitted {
                job_id: id.as_str().to_string(),
                timestamp: created_at_ms,
                service_required: job.service_required.clone(),
                source: submission.origin().to_string(),
            })
            .await;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobmux_core::{FakeClock, SequentialIdGen};
    use jobmux_registry::ConnectionRegistry;
    use jobmux_store::FakeStore;

    fn pipeline(store: FakeStore) -> AdmissionPipeline {
        let registry = Arc::new(ConnectionRegistry::new(None));
        let fanout = Arc::new(FanOutEngine::new(registry));
        AdmissionPipeline::new(
            Arc::new(store),
            fanout,
            Arc::new(SequentialIdGen::new("job")),
            Arc::new(FakeClock::new()),
        )
    }

    #[tokio::test]
    async fn submit_persists_hash_and_enqueues_score() {
        let store = FakeStore::new();
        let admission = pipeline(store.clone());

        let submission = JobSubmission {
            service_required: Some("render".to_string()),
            priority: Some(75),
            payload: serde_json::json!({"scene": "a.blend"}),
            ..Default::default()
        };
        let id = admission.submit(submission).await.unwrap();

        let hash = store.get_hash(&keys::job_key(id.as_str())).await.unwrap();
        let job = Job::from_hash(&hash).unwrap();
        assert_eq!(job.service_required, "render");
        assert_eq!(job.priority, 75);

        let members = store
            .range_by_score(keys::PENDING_SET, i64::MIN, i64::MAX, true, None)
            .await
            .unwrap();
        assert_eq!(members, vec![id.as_str().to_string()]);
    }

    #[tokio::test]
    async fn submit_rejects_oversized_payload() {
        let store = FakeStore::new();
        let admission = pipeline(store);

        let huge_string = "x".repeat(MAX_PAYLOAD_BYTES + 1);
        let submission = JobSubmission {
            payload: serde_json::Value::String(huge_string),
            ..Default::default()
        };

        let err = admission.submit(submission).await.unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
    }
}
