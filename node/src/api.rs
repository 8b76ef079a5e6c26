// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use bastion_kernel::checkpoint::Checkpoint;
use bastion_kernel::economy::{Inventory, Progression, ProgressionBonuses, RewardDeltas};
use serde::{Deserialize, Serialize};

use crate::ledger::FinalAccounting;
use crate::storage::PlayerRecord;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    #[serde(default)]
    pub start_wave: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerData {
    pub level: u32,
    pub fortress_hp_bps: u32,
    pub fortress_damage_bps: u32,
    pub attack_interval_ticks: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    pub session_token: String,
    pub seed: u32,
    pub sim_version: String,
    pub tick_hz: u32,
    pub starting_wave: u32,
    pub segment_audit_ticks: Vec<u32>,
    pub inventory: Inventory,
    pub progression_bonuses: ProgressionBonuses,
    pub fortress_base_hp: i32,
    pub fortress_base_damage: i32,
    pub wave_interval_ticks: u32,
    pub power_data: PowerData,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRequest {
    pub session_token: String,
    pub start_wave: u32,
    pub end_wave: u32,
    /// Decoded individually so a bad entry is a rejection, not a 400.
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    pub final_hash: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentResponse {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
    pub gold_earned: u64,
    pub dust_earned: u64,
    pub xp_earned: u64,
    pub next_segment_audit_ticks: Vec<u32>,
    pub new_inventory: Inventory,
    pub new_progression: Progression,
}

impl SegmentResponse {
    pub fn accepted(earned: RewardDeltas, audit_ticks: Vec<u32>, player: &PlayerRecord, duplicate: bool) -> Self {
        Self {
            verified: true,
            reject_reason: None,
            duplicate,
            gold_earned: earned.gold,
            dust_earned: earned.dust,
            xp_earned: earned.xp,
            next_segment_audit_ticks: audit_ticks,
            new_inventory: player.inventory,
            new_progression: player.progression,
        }
    }

    pub fn rejected(reason: &str, audit_ticks: Vec<u32>, player: &PlayerRecord) -> Self {
        Self {
            verified: false,
            reject_reason: Some(reason.to_string()),
            duplicate: false,
            gold_earned: 0,
            dust_earned: 0,
            xp_earned: 0,
            next_segment_audit_ticks: audit_ticks,
            new_inventory: player.inventory,
            new_progression: player.progression,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub session_token: String,
    pub final_wave: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionResponse {
    pub final_wave: u32,
    pub total_gold_earned: u64,
    pub total_dust_earned: u64,
    pub total_xp_earned: u64,
    pub new_inventory: Inventory,
    pub new_progression: Progression,
}

impl EndSessionResponse {
    pub fn new(accounting: &FinalAccounting, player: &PlayerRecord) -> Self {
        Self {
            final_wave: accounting.final_wave,
            total_gold_earned: accounting.total.gold,
            total_dust_earned: accounting.total.dust,
            total_xp_earned: accounting.total.xp,
            new_inventory: player.inventory,
            new_progression: player.progression,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
