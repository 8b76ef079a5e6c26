// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::checkpoint::{chain, genesis, hash_rules, hash_state, ChainBuilder, FnvHasher32};
use crate::event::{SimAction, SimEvent};
use crate::rules::{RULES_V1_0, RULES_V1_1};
use crate::tests::fixtures::{fresh_state, rules, SEED};

#[test]
fn test_fnv32_reference_vectors() {
    // Published FNV-1a 32 values
    let mut h = FnvHasher32::new();
    h.write(b"");
    assert_eq!(h.finish(), 0x811c_9dc5);
    let mut h = FnvHasher32::new();
    h.write(b"a");
    assert_eq!(h.finish(), 0xe40c_292c);
    let mut h = FnvHasher32::new();
    h.write(b"foobar");
    assert_eq!(h.finish(), 0xbf9c_f968);
}

#[test]
fn test_hash_state_is_pure() {
    let mut state = fresh_state(SEED);
    for _ in 0..50 {
        state.step(rules());
    }
    let copy = state.clone();
    assert_eq!(hash_state(&state), hash_state(&copy));
    assert_eq!(hash_state(&state), hash_state(&state));
}

#[test]
fn test_hash_covers_outcome_fields() {
    let base = fresh_state(SEED);
    let h = hash_state(&base);

    let mut relic = base.clone();
    relic.apply_event(&SimEvent::new(0, SimAction::Relic { relic: 2 }), rules());
    assert_ne!(hash_state(&relic), h);

    let mut target = base.clone();
    target.apply_event(&SimEvent::new(0, SimAction::Target { slot: Some(0) }), rules());
    assert_ne!(hash_state(&target), h);

    let mut wave = base.clone();
    wave.wave += 1;
    assert_ne!(hash_state(&wave), h);
}

#[test]
fn test_genesis_is_seed_derived_and_non_zero() {
    assert_ne!(genesis(SEED), genesis(SEED + 1));
    assert_ne!(genesis(0), 0);
    assert_eq!(genesis(SEED), genesis(SEED));
}

#[test]
fn test_chain_builder_matches_manual_fold() {
    let g = genesis(SEED);
    let mut builder = ChainBuilder::new(g);
    let a = builder.push(100, 0xAAAA_0001);
    let b = builder.push(200, 0xBBBB_0002);
    assert_eq!(a.chain_hash32, chain(g, 0xAAAA_0001));
    assert_eq!(b.chain_hash32, chain(a.chain_hash32, 0xBBBB_0002));
    assert_eq!(b.tick, 200);
    assert_eq!(builder.seal(7), chain(b.chain_hash32, 7));
}

#[test]
fn test_single_altered_hash_poisons_downstream_chain() {
    let g = genesis(SEED);
    let hashes = [11u32, 22, 33, 44, 55];
    let mut honest = ChainBuilder::new(g);
    let mut forged = ChainBuilder::new(g);
    let mut diverged = false;
    for (i, h) in hashes.iter().enumerate() {
        let h2 = if i == 1 { *h ^ 1 } else { *h };
        let a = honest.push(i as u32, *h);
        let b = forged.push(i as u32, h2);
        if i >= 1 {
            diverged = true;
            assert_ne!(a.chain_hash32, b.chain_hash32, "chain must differ from tick {} on", i);
        } else {
            assert_eq!(a.chain_hash32, b.chain_hash32);
        }
    }
    assert!(diverged);
}

#[test]
fn test_chain_is_not_commutative() {
    let g = genesis(SEED);
    assert_ne!(chain(chain(g, 1), 2), chain(chain(g, 2), 1));
    assert_ne!(chain(1, 2), chain(2, 1));
}

#[test]
fn test_rules_fingerprint_separates_versions() {
    assert_ne!(hash_rules(&RULES_V1_0), hash_rules(&RULES_V1_1));
    assert_eq!(hash_rules(&RULES_V1_1), hash_rules(&RULES_V1_1.clone()));
}
