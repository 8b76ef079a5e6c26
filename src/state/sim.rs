// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Tick-based combat simulation.
//!
//! All arithmetic is Q16.16 fixed point with saturation; no floats, no host
//! randomness, no clocks. Given the same params, rules and event stream, every
//! machine produces the same state at every tick.

use alloc::vec::Vec;
use serde::{Serialize, Deserialize};

use crate::config::{MAX_ENEMIES, SKILL_COUNT};
use crate::economy::ProgressionBonuses;
use crate::event::{SimAction, SimEvent, RELIC_BULWARK, RELIC_HASTE, RELIC_SHARPENED, SKILL_BARRAGE, SKILL_REPAIR};
use crate::fxp::ops::{from_int, fxp_add, fxp_scale_bps, fxp_sub};
use crate::prng::Prng;
use crate::rules::SimRules;
use crate::types::scalar::FxpScalar;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub hp: FxpScalar,
    pub distance: FxpScalar,
    pub speed: FxpScalar,
    pub damage: FxpScalar,
}

/// Per-session constants fixed at session start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimParams {
    pub seed: u32,
    pub starting_wave: u32,
    pub fortress_max_hp: i32,
    pub fortress_damage: i32,
}

impl SimParams {
    pub fn new(seed: u32, starting_wave: u32, rules: &SimRules, bonuses: &ProgressionBonuses) -> Self {
        Self {
            seed,
            starting_wave,
            fortress_max_hp: scale_int(rules.fortress_base_hp, bonuses.fortress_hp_bps),
            fortress_damage: scale_int(rules.fortress_base_damage, bonuses.fortress_damage_bps),
        }
    }
}

fn scale_int(v: i32, bps: u32) -> i32 {
    let scaled = (v as i64) * (bps as i64) / 10_000;
    scaled.clamp(1, i32::MAX as i64 / crate::config::SCALE as i64) as i32
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    pub(crate) tick: u32,
    pub(crate) wave: u32,
    pub(crate) wave_tick: u32,
    pub(crate) rng: Prng,
    pub(crate) fortress_hp: FxpScalar,
    pub(crate) fortress_max_hp: FxpScalar,
    pub(crate) fortress_damage: FxpScalar,
    pub(crate) attack_cooldown: u32,
    pub(crate) enemies: Vec<Enemy>,
    pub(crate) kills: u32,
    pub(crate) relics: u8,
    pub(crate) skill_cooldowns: [u32; SKILL_COUNT],
    pub(crate) target: Option<u8>,
    pub(crate) fallen: bool,
}

impl SimState {
    pub fn genesis(params: &SimParams) -> Self {
        Self {
            tick: 0,
            wave: params.starting_wave,
            wave_tick: 0,
            rng: Prng::new(params.seed),
            fortress_hp: from_int(params.fortress_max_hp),
            fortress_max_hp: from_int(params.fortress_max_hp),
            fortress_damage: from_int(params.fortress_damage),
            attack_cooldown: 0,
            enemies: Vec::new(),
            kills: 0,
            relics: 0,
            skill_cooldowns: [0; SKILL_COUNT],
            target: None,
            fallen: false,
        }
    }

    // --- Read APIs ---

    /// Ticks simulated since the session began.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn wave_tick(&self) -> u32 {
        self.wave_tick
    }

    pub fn fortress_hp(&self) -> FxpScalar {
        self.fortress_hp
    }

    pub fn fortress_max_hp(&self) -> FxpScalar {
        self.fortress_max_hp
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn has_relic(&self, relic: u8) -> bool {
        self.relics & (1 << relic) != 0
    }

    pub fn fallen(&self) -> bool {
        self.fallen
    }

    // --- Write Logic ---

    /// Applies a player event. Invalid ids are no-ops; callers validate first.
    pub fn apply_event(&mut self, event: &SimEvent, rules: &SimRules) {
        if self.fallen {
            return;
        }
        match event.action {
            SimAction::Skill { skill } => self.activate_skill(skill, rules),
            SimAction::Relic { relic } => {
                if relic < 8 {
                    self.relics |= 1 << relic;
                }
            }
            SimAction::Target { slot } => self.target = slot,
        }
    }

    fn activate_skill(&mut self, skill: u8, rules: &SimRules) {
        let idx = skill as usize;
        if idx >= SKILL_COUNT || self.skill_cooldowns[idx] > 0 {
            return;
        }
        match skill {
            SKILL_BARRAGE => {
                let dmg = fxp_add(self.effective_damage(), self.effective_damage());
                for enemy in self.enemies.iter_mut() {
                    enemy.hp = fxp_sub(enemy.hp, dmg);
                }
                let before = self.enemies.len();
                self.enemies.retain(|e| e.hp.is_positive());
                self.kills += (before - self.enemies.len()) as u32;
                self.skill_cooldowns[idx] = rules.barrage_cooldown_ticks;
            }
            SKILL_REPAIR => {
                let heal = fxp_scale_bps(self.fortress_max_hp, rules.repair_bps);
                self.fortress_hp = fxp_add(self.fortress_hp, heal).min(self.fortress_max_hp);
                self.skill_cooldowns[idx] = rules.repair_cooldown_ticks;
            }
            _ => {}
        }
    }

    fn effective_damage(&self) -> FxpScalar {
        if self.has_relic(RELIC_SHARPENED) {
            fxp_scale_bps(self.fortress_damage, 12_500)
        } else {
            self.fortress_damage
        }
    }

    fn effective_attack_interval(&self, rules: &SimRules) -> u32 {
        let base = rules.attack_interval_ticks;
        let interval = if self.has_relic(RELIC_HASTE) { base * 3 / 4 } else { base };
        interval.max(1)
    }

    fn incoming_damage(&self, raw: FxpScalar) -> FxpScalar {
        if self.has_relic(RELIC_BULWARK) {
            fxp_scale_bps(raw, 7_500)
        } else {
            raw
        }
    }

    fn pick_target(&self) -> usize {
        if let Some(slot) = self.target {
            if (slot as usize) < self.enemies.len() {
                return slot as usize;
            }
        }
        // Nearest first, lowest slot on ties.
        let mut best = 0;
        for (i, enemy) in self.enemies.iter().enumerate() {
            if enemy.distance < self.enemies[best].distance {
                best = i;
            }
        }
        best
    }

    fn spawn_wave(&mut self, rules: &SimRules) {
        let extra = if rules.enemy_count_step_waves == 0 { 0 } else { self.wave / rules.enemy_count_step_waves };
        let count = rules.enemy_base_count.saturating_add(extra);
        let growth = 10_000u32.saturating_add(rules.enemy_hp_growth_bps.saturating_mul(self.wave));
        let hp = fxp_scale_bps(from_int(rules.enemy_base_hp), growth);

        for _ in 0..count {
            // Draw even when the field is full so the stream does not depend on capacity.
            let jitter = self.rng.next_below(rules.spawn_jitter + 1) as i32;
            if self.enemies.len() >= MAX_ENEMIES {
                continue;
            }
            self.enemies.push(Enemy {
                hp,
                distance: from_int(rules.spawn_distance.saturating_add(jitter)),
                speed: rules.enemy_speed,
                damage: from_int(rules.enemy_damage),
            });
        }
    }

    /// Advances the simulation by exactly one tick.
    pub fn step(&mut self, rules: &SimRules) {
        if self.fallen {
            return;
        }

        if self.wave_tick == 0 {
            self.spawn_wave(rules);
        }

        // 1. Fortress fire
        if self.attack_cooldown > 0 {
            self.attack_cooldown -= 1;
        }
        if self.attack_cooldown == 0 && !self.enemies.is_empty() {
            let idx = self.pick_target();
            let dmg = self.effective_damage();
            let enemy = &mut self.enemies[idx];
            enemy.hp = fxp_sub(enemy.hp, dmg);
            if !enemy.hp.is_positive() {
                self.enemies.remove(idx);
                self.kills += 1;
            }
            self.attack_cooldown = self.effective_attack_interval(rules);
        }

        // 2. Enemy advance
        let mut i = 0;
        while i < self.enemies.len() {
            let enemy = &mut self.enemies[i];
            enemy.distance = fxp_sub(enemy.distance, enemy.speed);
            if enemy.distance.is_positive() {
                i += 1;
                continue;
            }
            let raw = enemy.damage;
            let hit = self.incoming_damage(raw);
            self.fortress_hp = fxp_sub(self.fortress_hp, hit);
            self.enemies.remove(i);
        }

        // 3. Cooldowns
        for cd in self.skill_cooldowns.iter_mut() {
            *cd = cd.saturating_sub(1);
        }

        if !self.fortress_hp.is_positive() {
            self.fortress_hp = FxpScalar::ZERO;
            self.fallen = true;
        }

        // 4. Clock
        self.tick += 1;
        self.wave_tick += 1;
        if self.wave_tick >= rules.wave_interval_ticks {
            self.wave += 1;
            self.wave_tick = 0;
        }
    }
}
