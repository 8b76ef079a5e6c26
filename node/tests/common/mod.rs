// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bastion_kernel::checkpoint::genesis;
use bastion_kernel::event::{SimAction, SimEvent};
use bastion_kernel::replay::{record_segment, RecordedSegment};
use bastion_kernel::rules::{ruleset, SimRules};
use bastion_kernel::state::{SimParams, SimState};
use bastion_node::api::{SegmentRequest, StartSessionResponse};
use bastion_node::audit::FixedAuditPolicy;
use bastion_node::config::NodeConfig;
use bastion_node::engine::Engine;
use bastion_node::server::{build_router, SharedEngine};
use bastion_node::storage::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const AUDIT: [u32; 2] = [100, 200];

pub fn test_config() -> NodeConfig {
    NodeConfig {
        replay_workers: 2,
        audit_key: Some([3u8; 32]),
        ..NodeConfig::default()
    }
}

pub fn engine_with(cfg: &NodeConfig, store: Arc<MemoryStore>) -> SharedEngine {
    let audit = Arc::new(FixedAuditPolicy::new(AUDIT.to_vec()));
    Arc::new(Engine::with_audit_policy(cfg, store, audit).unwrap())
}

pub fn test_engine() -> (SharedEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (engine_with(&test_config(), store.clone()), store)
}

pub async fn post(engine: &SharedEngine, uri: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("authorization", format!("Bearer {}", user));
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();

    let resp = build_router(engine.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub fn inputs() -> Vec<SimEvent> {
    vec![
        SimEvent::new(10, SimAction::Relic { relic: 0 }),
        SimEvent::new(40, SimAction::Target { slot: Some(1) }),
        SimEvent::new(90, SimAction::Skill { skill: 0 }),
        SimEvent::new(150, SimAction::Target { slot: None }),
        SimEvent::new(400, SimAction::Skill { skill: 1 }),
    ]
}

/// Honest client: plays locally with the same kernel the server replays.
pub struct Client {
    pub token: String,
    pub rules: &'static SimRules,
    pub state: SimState,
    pub chain: u32,
    pub audit_ticks: Vec<u32>,
}

impl Client {
    pub fn from_start(resp: &StartSessionResponse) -> Self {
        let rules = ruleset(&resp.sim_version).unwrap();
        let params = SimParams::new(resp.seed, resp.starting_wave, rules, &resp.progression_bonuses);
        Self {
            token: resp.session_token.clone(),
            rules,
            state: SimState::genesis(&params),
            chain: genesis(resp.seed),
            audit_ticks: resp.segment_audit_ticks.clone(),
        }
    }

    pub fn play(&self, end_wave: u32, events: Vec<SimEvent>) -> RecordedSegment {
        record_segment(&self.state, self.rules, self.chain, end_wave, events, &self.audit_ticks).unwrap()
    }

    /// Moves the local anchor forward once the server accepted `rec`.
    pub fn accept(&mut self, rec: &RecordedSegment, next_audit: Vec<u32>) {
        self.state = rec.end_state.clone();
        self.chain = rec.final_hash;
        self.audit_ticks = next_audit;
    }

    pub fn body(&self, rec: &RecordedSegment) -> Value {
        json!({
            "sessionToken": self.token,
            "startWave": rec.start_wave,
            "endWave": rec.end_wave,
            "events": rec.events,
            "checkpoints": rec.checkpoints,
            "finalHash": rec.final_hash,
        })
    }

    pub fn request(&self, rec: &RecordedSegment) -> SegmentRequest {
        serde_json::from_value(self.body(rec)).unwrap()
    }
}

pub fn audit_ticks(v: &Value) -> Vec<u32> {
    serde_json::from_value(v["nextSegmentAuditTicks"].clone()).unwrap()
}
