// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::event::{SimAction, SimEvent};
use crate::replay::{record_segment, RecordedSegment};
use crate::rules::RULES_V1_0;
use crate::state::SimState;
use crate::tests::fixtures::{fresh_state, rules, sample_events, start_chain, AUDIT, SEED};
use crate::verify::{validate_structure, verify_segment, Anchor, Rejection, SegmentClaim, VerifyLimits};

fn recorded(base: &SimState, audit: &[u32]) -> RecordedSegment {
    record_segment(base, rules(), start_chain(SEED), 5, sample_events(), audit).unwrap()
}

fn claim_of(seg: &RecordedSegment) -> SegmentClaim {
    SegmentClaim {
        start_wave: seg.start_wave,
        end_wave: seg.end_wave,
        events: seg.events.clone(),
        checkpoints: seg.checkpoints.clone(),
        final_hash: seg.final_hash,
    }
}

fn verify(claim: &SegmentClaim, base: &SimState) -> Result<crate::verify::VerifiedSegment, Rejection> {
    let anchor = Anchor { state: base, chain_hash: start_chain(SEED), audit_ticks: &AUDIT };
    verify_segment(claim, &anchor, rules(), &VerifyLimits::default(), None)
}

#[test]
fn test_honest_segment_verifies() {
    let base = fresh_state(SEED);
    let seg = recorded(&base, &AUDIT);
    let verified = verify(&claim_of(&seg), &base).unwrap();

    assert_eq!(verified.wave_delta(), 5);
    assert_eq!(verified.final_hash, seg.final_hash);
    assert_eq!(verified.end_state, seg.end_state);
    assert_eq!(verified.checkpoints_verified, 2);
}

#[test]
fn test_tampered_state_hash_fails_fast() {
    let base = fresh_state(SEED);
    let mut claim = claim_of(&recorded(&base, &AUDIT));
    claim.checkpoints[0].hash32 ^= 1;
    claim.checkpoints[1].hash32 ^= 1;

    let err = verify(&claim, &base).unwrap_err();
    assert!(matches!(err, Rejection::ChecksumMismatch { tick: 100, .. }));
    assert_eq!(err.failed_tick(), Some(100));
    assert_eq!(err.reason(), "replay_mismatch");
    assert!(!err.is_structural());
}

#[test]
fn test_tampered_chain_hash_detected() {
    let base = fresh_state(SEED);
    let mut claim = claim_of(&recorded(&base, &AUDIT));
    claim.checkpoints[1].chain_hash32 = claim.checkpoints[1].chain_hash32.wrapping_add(1);

    let err = verify(&claim, &base).unwrap_err();
    assert!(matches!(err, Rejection::ChainMismatch { tick: Some(200), .. }));
}

#[test]
fn test_tampered_final_hash_detected() {
    let base = fresh_state(SEED);
    let mut claim = claim_of(&recorded(&base, &AUDIT));
    claim.final_hash ^= 0x8000_0000;

    let err = verify(&claim, &base).unwrap_err();
    assert!(matches!(err, Rejection::ChainMismatch { tick: None, .. }));
    assert_eq!(err.failed_tick(), None);
}

#[test]
fn test_forged_event_log_diverges() {
    let base = fresh_state(SEED);
    let mut claim = claim_of(&recorded(&base, &AUDIT));
    // Claim a barrage that was never played
    claim.events.push(SimEvent::new(50, SimAction::Skill { skill: 0 }));
    claim.events.retain(|e| e.tick != 90);

    let err = verify(&claim, &base).unwrap_err();
    assert_eq!(err.failed_tick(), Some(100));
}

#[test]
fn test_omitted_checkpoint_breaks_final_hash() {
    let base = fresh_state(SEED);
    // Client chained an extra checkpoint at 150 then dropped it from the submission
    let seg = recorded(&base, &[100, 150, 200]);
    let mut claim = claim_of(&seg);
    claim.checkpoints.retain(|c| c.tick != 150);

    let err = verify(&claim, &base).unwrap_err();
    assert!(matches!(err, Rejection::ChainMismatch { .. }));
}

#[test]
fn test_extra_checkpoints_are_accepted_when_honest() {
    let base = fresh_state(SEED);
    let seg = recorded(&base, &[50, 100, 150, 200, 1_500]);
    assert!(verify(&claim_of(&seg), &base).is_ok());
}

#[test]
fn test_replay_pins_ruleset() {
    let base = fresh_state(SEED);
    let claim = claim_of(&recorded(&base, &AUDIT));
    let anchor = Anchor { state: &base, chain_hash: start_chain(SEED), audit_ticks: &AUDIT };
    let err = verify_segment(&claim, &anchor, &RULES_V1_0, &VerifyLimits::default(), None).unwrap_err();
    assert_eq!(err.reason(), "replay_mismatch");
}

#[test]
fn test_structural_rejections() {
    let base = fresh_state(SEED);
    let honest = claim_of(&recorded(&base, &AUDIT));
    let anchor = Anchor { state: &base, chain_hash: start_chain(SEED), audit_ticks: &AUDIT };
    let limits = VerifyLimits { max_segment_waves: 10, max_events: 8 };
    let check = |c: &SegmentClaim| validate_structure(c, &anchor, rules(), &limits);

    assert_eq!(check(&honest), Ok(1_500));

    let mut c = honest.clone();
    c.end_wave = 0;
    assert_eq!(check(&c), Err(Rejection::InvalidWaveRange { start: 0, end: 0 }));

    let mut c = honest.clone();
    c.start_wave = 1;
    c.end_wave = 6;
    assert_eq!(check(&c), Err(Rejection::WaveMismatch { expected: 0, claimed: 1 }));

    let mut c = honest.clone();
    c.end_wave = 11;
    assert_eq!(check(&c), Err(Rejection::SegmentTooLong { waves: 11, limit: 10 }));

    let mut c = honest.clone();
    c.events = vec![SimEvent::new(1, SimAction::Relic { relic: 0 }); 9];
    assert_eq!(check(&c), Err(Rejection::TooManyEvents { count: 9, limit: 8 }));

    let mut c = honest.clone();
    c.events[2] = SimEvent::new(5, SimAction::Skill { skill: 42 });
    assert_eq!(check(&c), Err(Rejection::MalformedEvent { index: 2 }));

    let mut c = honest.clone();
    c.events.push(SimEvent::new(1_500, SimAction::Skill { skill: 0 }));
    assert_eq!(check(&c), Err(Rejection::EventOutOfRange { index: 5, tick: 1_500 }));

    let mut c = honest.clone();
    c.checkpoints.swap(0, 1);
    assert_eq!(check(&c), Err(Rejection::CheckpointsOutOfOrder { index: 1 }));

    let mut c = honest.clone();
    c.checkpoints.push(crate::checkpoint::Checkpoint { tick: 1_501, hash32: 0, chain_hash32: 0 });
    assert_eq!(check(&c), Err(Rejection::CheckpointOutOfRange { tick: 1_501 }));

    let mut c = honest.clone();
    c.checkpoints.remove(1);
    let err = check(&c).unwrap_err();
    assert_eq!(err, Rejection::MissingAuditTick { tick: 200 });
    assert!(err.is_structural());
    assert_eq!(err.reason(), "missing_audit_tick");
}

#[test]
fn test_cancelled_verification_is_rejected() {
    let base = fresh_state(SEED);
    let claim = claim_of(&recorded(&base, &AUDIT));
    let anchor = Anchor { state: &base, chain_hash: start_chain(SEED), audit_ticks: &AUDIT };
    let cancel = core::sync::atomic::AtomicBool::new(true);
    let err = verify_segment(&claim, &anchor, rules(), &VerifyLimits::default(), Some(&cancel)).unwrap_err();
    assert_eq!(err, Rejection::Cancelled);
    assert_eq!(err.reason(), "timeout");
}
