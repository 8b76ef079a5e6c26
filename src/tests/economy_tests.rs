// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::economy::{price_partial, price_segment, xp_to_next, Inventory, Progression, ProgressionBonuses, RewardDeltas, MAX_LEVEL};

#[test]
fn test_price_segment_base_rates() {
    let bonuses = ProgressionBonuses::for_level(1);
    // waves 1..=5: gold 10+2w, dust on wave 5, xp 5+w
    assert_eq!(price_segment(0, 5, &bonuses), RewardDeltas { gold: 80, dust: 1, xp: 40 });
    assert_eq!(price_segment(9, 10, &bonuses), RewardDeltas { gold: 30, dust: 2, xp: 15 });
}

#[test]
fn test_price_segment_is_pure() {
    let bonuses = ProgressionBonuses::for_level(17);
    let a = price_segment(12, 31, &bonuses);
    let b = price_segment(12, 31, &bonuses);
    assert_eq!(a, b);
}

#[test]
fn test_price_segment_applies_multipliers() {
    let bonuses = ProgressionBonuses::for_level(11);
    assert_eq!(bonuses.gold_multiplier_bps, 12_000);
    // 80 * 1.2, 1 * 1.1 floored, 40 * 1.1
    assert_eq!(price_segment(0, 5, &bonuses), RewardDeltas { gold: 96, dust: 1, xp: 44 });
}

#[test]
fn test_price_segment_is_additive_at_base_rate() {
    let bonuses = ProgressionBonuses::for_level(1);
    let whole = price_segment(0, 12, &bonuses);
    let split = price_segment(0, 7, &bonuses).saturating_add(price_segment(7, 12, &bonuses));
    assert_eq!(whole, split);
}

#[test]
fn test_empty_or_reversed_range_prices_zero() {
    let bonuses = ProgressionBonuses::default();
    assert!(price_segment(4, 4, &bonuses).is_zero());
    assert!(price_segment(9, 3, &bonuses).is_zero());
}

#[test]
fn test_partial_credit_rate() {
    let bonuses = ProgressionBonuses::for_level(1);
    // waves 6, 7, 8 at full rate: gold 72, dust 0, xp 36
    let (waves, half) = price_partial(5, 8, 10, 5_000, &bonuses);
    assert_eq!(waves, 3);
    assert_eq!(half, RewardDeltas { gold: 36, dust: 0, xp: 18 });
    assert!(half.gold < price_segment(5, 8, &bonuses).gold);
}

#[test]
fn test_partial_credit_is_capped() {
    let bonuses = ProgressionBonuses::for_level(1);
    let (waves, capped) = price_partial(5, 500, 10, 10_000, &bonuses);
    assert_eq!(waves, 10);
    assert_eq!(capped, price_segment(5, 15, &bonuses));

    assert_eq!(price_partial(5, 3, 10, 5_000, &bonuses), (0, RewardDeltas::ZERO));
}

#[test]
fn test_xp_levels_up_with_carry() {
    let mut p = Progression::default();
    p.gain_xp(250);
    assert_eq!(p, Progression { level: 2, xp: 150, total_xp: 250 });
    p.gain_xp(50);
    assert_eq!(p.level, 3);
    assert_eq!(p.xp, 0);
    assert_eq!(xp_to_next(3), 300);
}

#[test]
fn test_level_cap() {
    let mut p = Progression { level: MAX_LEVEL, xp: 0, total_xp: 0 };
    p.gain_xp(1_000_000);
    assert_eq!(p.level, MAX_LEVEL);
    assert_eq!(p.xp, 1_000_000);
}

#[test]
fn test_inventory_credit_leaves_sigils() {
    let mut inv = Inventory { gold: 5, dust: 1, sigils: 3 };
    inv.credit(&RewardDeltas { gold: 10, dust: 2, xp: 99 });
    assert_eq!(inv, Inventory { gold: 15, dust: 3, sigils: 3 });
}
