// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::{Context, Result};
use bastion_kernel::checkpoint::genesis;
use bastion_kernel::rules;
use bastion_kernel::state::{SimParams, SimState};
use bastion_kernel::verify::{verify_segment, Anchor, SegmentClaim, VerifyLimits};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replays a recorded session bundle and reports each segment", long_about = None)]
struct Args {
    /// Path to the session bundle (JSON)
    bundle: PathBuf,

    #[arg(long, default_value_t = 50)]
    max_segment_waves: u32,

    #[arg(long, default_value_t = 4096)]
    max_events: usize,
}

/// A whole session as recorded by a client or exported for dispute review.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Bundle {
    seed: u32,
    sim_version: String,
    starting_wave: u32,
    fortress_max_hp: i32,
    fortress_damage: i32,
    /// Schedule in force for each segment, in order.
    audit_ticks: Vec<Vec<u32>>,
    segments: Vec<SegmentClaim>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct SegmentReport {
    index: usize,
    start_wave: u32,
    end_wave: u32,
    verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_tick: Option<u32>,
}

/// Replays segments in order from genesis, stopping at the first rejection.
fn run_bundle(bundle: &Bundle, limits: &VerifyLimits) -> Result<Vec<SegmentReport>> {
    let rules = rules::ruleset(&bundle.sim_version)
        .with_context(|| format!("Unknown simulation version {:?}", bundle.sim_version))?;
    if bundle.audit_ticks.len() < bundle.segments.len() {
        anyhow::bail!(
            "Bundle has {} segments but only {} audit schedules",
            bundle.segments.len(),
            bundle.audit_ticks.len()
        );
    }

    let params = SimParams {
        seed: bundle.seed,
        starting_wave: bundle.starting_wave,
        fortress_max_hp: bundle.fortress_max_hp,
        fortress_damage: bundle.fortress_damage,
    };
    let mut state = SimState::genesis(&params);
    let mut chain = genesis(bundle.seed);
    let mut reports = Vec::with_capacity(bundle.segments.len());

    for (index, claim) in bundle.segments.iter().enumerate() {
        let anchor = Anchor { state: &state, chain_hash: chain, audit_ticks: &bundle.audit_ticks[index] };
        match verify_segment(claim, &anchor, rules, limits, None) {
            Ok(verified) => {
                reports.push(SegmentReport {
                    index,
                    start_wave: claim.start_wave,
                    end_wave: claim.end_wave,
                    verified: true,
                    reason: None,
                    detail: None,
                    failed_tick: None,
                });
                chain = verified.final_hash;
                state = verified.end_state;
            }
            Err(rejection) => {
                reports.push(SegmentReport {
                    index,
                    start_wave: claim.start_wave,
                    end_wave: claim.end_wave,
                    verified: false,
                    reason: Some(rejection.reason()),
                    detail: Some(rejection.to_string()),
                    failed_tick: rejection.failed_tick(),
                });
                break;
            }
        }
    }
    Ok(reports)
}

fn main() -> Result<()> {
    let args = Args::parse();

    eprintln!("Bastion Verifier v{}", env!("CARGO_PKG_VERSION"));

    // 1. Load Bundle
    let raw = fs::read(&args.bundle).context("Failed to read bundle file")?;
    let bundle: Bundle = serde_json::from_slice(&raw).context("Failed to parse bundle JSON")?;
    eprintln!(
        "Session: seed={:#010x}, version={}, segments={}",
        bundle.seed,
        bundle.sim_version,
        bundle.segments.len()
    );

    // 2. Replay
    let limits = VerifyLimits { max_segment_waves: args.max_segment_waves, max_events: args.max_events };
    let reports = run_bundle(&bundle, &limits)?;

    // 3. Output JSON
    println!("{}", serde_json::to_string_pretty(&reports)?);

    if let Some(bad) = reports.iter().find(|r| !r.verified) {
        anyhow::bail!(
            "Segment {} rejected: {}",
            bad.index,
            bad.detail.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}
