// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Off-runtime replay.
//!
//! Replays are CPU bound, so they run on the blocking pool. A semaphore caps
//! how many run at once and a deadline covers both the wait for a permit and
//! the replay itself. When the deadline passes the cancel flag is raised and
//! the replay stops at its next poll; nothing has been credited by then.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bastion_kernel::event::SimEvent;
use bastion_kernel::rules::SimRules;
use bastion_kernel::state::SimState;
use bastion_kernel::verify::{verify_segment, Anchor, Rejection, SegmentClaim, VerifiedSegment, VerifyLimits};
use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::api::SegmentRequest;
use crate::errors::EngineError;

pub type Verdict = Result<VerifiedSegment, Rejection>;

/// Anchor data moved onto the blocking pool.
pub struct ReplayJob {
    pub claim: SegmentClaim,
    pub base: SimState,
    pub chain_hash: u32,
    pub audit_ticks: Vec<u32>,
    pub rules: &'static SimRules,
}

pub struct Verifier {
    workers: Arc<Semaphore>,
    timeout: Duration,
    limits: VerifyLimits,
}

impl Verifier {
    pub fn new(workers: usize, timeout: Duration, limits: VerifyLimits) -> Self {
        Self { workers: Arc::new(Semaphore::new(workers.max(1))), timeout, limits }
    }

    /// Turns a wire request into a claim. Events are decoded one by one so a
    /// bad entry is reported by index.
    pub fn decode_claim(&self, req: SegmentRequest) -> Result<SegmentClaim, Rejection> {
        if req.events.len() > self.limits.max_events {
            return Err(Rejection::TooManyEvents { count: req.events.len(), limit: self.limits.max_events });
        }
        let events = req
            .events
            .iter()
            .enumerate()
            .map(|(index, raw)| SimEvent::deserialize(raw).map_err(|_| Rejection::MalformedEvent { index }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SegmentClaim {
            start_wave: req.start_wave,
            end_wave: req.end_wave,
            events,
            checkpoints: req.checkpoints,
            final_hash: req.final_hash,
        })
    }

    /// Runs the replay. The outer error is infrastructure failure; the inner
    /// result is the verdict.
    pub async fn verify(&self, job: ReplayJob) -> Result<Verdict, EngineError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let started = Instant::now();

        let run = {
            let cancel = cancel.clone();
            let workers = self.workers.clone();
            let limits = self.limits;
            async move {
                let permit = workers
                    .acquire_owned()
                    .await
                    .map_err(|_| EngineError::Internal("replay pool closed".into()))?;
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let anchor = Anchor {
                        state: &job.base,
                        chain_hash: job.chain_hash,
                        audit_ticks: &job.audit_ticks,
                    };
                    verify_segment(&job.claim, &anchor, job.rules, &limits, Some(&cancel))
                })
                .await
                .map_err(|e| EngineError::Internal(format!("replay task failed: {}", e)))
            }
        };

        let verdict = match tokio::time::timeout(self.timeout, run).await {
            Ok(res) => res?,
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                Err(Rejection::Cancelled)
            }
        };
        metrics::histogram!("bastion_replay_duration_seconds", started.elapsed().as_secs_f64());
        Ok(verdict)
    }
}
