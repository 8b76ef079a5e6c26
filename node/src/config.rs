// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use bastion_kernel::rules;
use thiserror::Error;

/// Upper bound on the audit horizon; schedules are materialised per segment.
pub const MAX_AUDIT_HORIZON_WAVES: u32 = 1_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("unknown simulation version {0:?}")]
    UnknownSimVersion(String),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    /// Ruleset handed to new sessions.
    pub live_sim_version: String,

    pub audit_interval_ticks: u32,
    pub audit_jitter_ticks: u32,
    pub audit_horizon_waves: u32,
    /// Secret for audit schedule derivation. Random per process when unset.
    pub audit_key: Option<[u8; 32]>,

    pub max_segment_waves: u32,
    pub max_segment_events: usize,
    pub verify_timeout_ms: u64,
    pub replay_workers: usize,

    pub partial_credit_bps: u32,
    pub partial_credit_max_waves: u32,

    pub session_timeout_secs: u64,
    /// How long an ended session still answers end retries and duplicates.
    pub ended_retention_secs: u64,
    pub sweep_interval_secs: u64,

    pub snapshot_path: Option<PathBuf>,
    pub auto_snapshot_interval_secs: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            live_sim_version: rules::latest().version.to_string(),
            audit_interval_ticks: 100,
            audit_jitter_ticks: 24,
            audit_horizon_waves: 10,
            audit_key: None,
            max_segment_waves: 50,
            max_segment_events: 4096,
            verify_timeout_ms: 5_000,
            replay_workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            partial_credit_bps: 5_000,
            partial_credit_max_waves: 10,
            session_timeout_secs: 1_800,
            ended_retention_secs: 1_800,
            sweep_interval_secs: 60,
            snapshot_path: None,
            auto_snapshot_interval_secs: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_opt<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(None),
    }
}

/// Decodes a 64-character hex string into a 32-byte key.
pub fn parse_audit_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let invalid = || ConfigError::InvalidValue { key: "BASTION_AUDIT_KEY", value: "<redacted>".into() };
    let bytes = hex::decode(raw.trim()).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

impl NodeConfig {
    /// Reads `BASTION_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let audit_key = match std::env::var("BASTION_AUDIT_KEY") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_audit_key(&raw)?),
            _ => None,
        };

        Ok(Self {
            bind_addr: env_parse("BASTION_BIND_ADDR", d.bind_addr)?,
            live_sim_version: env_parse("BASTION_SIM_VERSION", d.live_sim_version)?,
            audit_interval_ticks: env_parse("BASTION_AUDIT_INTERVAL_TICKS", d.audit_interval_ticks)?,
            audit_jitter_ticks: env_parse("BASTION_AUDIT_JITTER_TICKS", d.audit_jitter_ticks)?,
            audit_horizon_waves: env_parse("BASTION_AUDIT_HORIZON_WAVES", d.audit_horizon_waves)?,
            audit_key,
            max_segment_waves: env_parse("BASTION_MAX_SEGMENT_WAVES", d.max_segment_waves)?,
            max_segment_events: env_parse("BASTION_MAX_SEGMENT_EVENTS", d.max_segment_events)?,
            verify_timeout_ms: env_parse("BASTION_VERIFY_TIMEOUT_MS", d.verify_timeout_ms)?,
            replay_workers: env_parse("BASTION_REPLAY_WORKERS", d.replay_workers)?,
            partial_credit_bps: env_parse("BASTION_PARTIAL_CREDIT_BPS", d.partial_credit_bps)?,
            partial_credit_max_waves: env_parse("BASTION_PARTIAL_CREDIT_MAX_WAVES", d.partial_credit_max_waves)?,
            session_timeout_secs: env_parse("BASTION_SESSION_TIMEOUT_SECS", d.session_timeout_secs)?,
            ended_retention_secs: env_parse("BASTION_ENDED_RETENTION_SECS", d.ended_retention_secs)?,
            sweep_interval_secs: env_parse("BASTION_SWEEP_INTERVAL_SECS", d.sweep_interval_secs)?,
            snapshot_path: env_opt("BASTION_SNAPSHOT_PATH")?,
            auto_snapshot_interval_secs: env_opt("BASTION_AUTO_SNAPSHOT_SECS")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let live = rules::ruleset(&self.live_sim_version)
            .ok_or_else(|| ConfigError::UnknownSimVersion(self.live_sim_version.clone()))?;

        if self.audit_interval_ticks == 0 {
            return Err(ConfigError::Invalid("audit_interval_ticks must be positive"));
        }
        if self.audit_jitter_ticks >= self.audit_interval_ticks {
            return Err(ConfigError::Invalid("audit_jitter_ticks must be below audit_interval_ticks"));
        }
        // Every segment spans at least one wave, so the first slot has to land inside it.
        if self.audit_interval_ticks + self.audit_jitter_ticks / 2 > live.wave_interval_ticks {
            return Err(ConfigError::Invalid("first audit slot must fall inside one wave"));
        }
        if self.audit_horizon_waves == 0 || self.audit_horizon_waves > MAX_AUDIT_HORIZON_WAVES {
            return Err(ConfigError::Invalid("audit_horizon_waves must be in 1..=1000"));
        }
        if self.max_segment_waves == 0 || self.max_segment_events == 0 {
            return Err(ConfigError::Invalid("segment limits must be positive"));
        }
        if self.replay_workers == 0 {
            return Err(ConfigError::Invalid("replay_workers must be positive"));
        }
        if self.verify_timeout_ms == 0 {
            return Err(ConfigError::Invalid("verify_timeout_ms must be positive"));
        }
        if self.partial_credit_bps > 10_000 {
            return Err(ConfigError::Invalid("partial_credit_bps must not exceed 10000"));
        }
        if self.ended_retention_secs == 0 {
            return Err(ConfigError::Invalid("ended_retention_secs must be positive"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep_interval_secs must be positive"));
        }
        if self.auto_snapshot_interval_secs == Some(0) {
            return Err(ConfigError::Invalid("auto_snapshot_interval_secs must be positive"));
        }
        Ok(())
    }
}
