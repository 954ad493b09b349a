use chrono::NaiveDate;
use ganyan::error::GanyanError;
use ganyan::strategy::{
    CalibratedRace, DecisionEngine, RaceProgram, ReconciliationLock, ScoreCalibrator, SequenceBuilder,
};
use ganyan::{ProfileStore, RaceKey, Runner, Surface};

const VENUE: &str = "Istanbul";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 14).unwrap()
}

fn entry(name: &str, race_no: u32) -> Runner {
    Runner::new(name, RaceKey::new(VENUE, today(), race_no), Surface::Dirt, 1400)
}

fn calibrate(program: &[Runner], store: &ProfileStore) -> Vec<CalibratedRace> {
    let scored = DecisionEngine::default().score(program, store);
    ScoreCalibrator::default().calibrate(&scored)
}

#[test]
fn strict_subset_of_program_never_reconciles() {
    let names = ["A", "B", "C", "D", "E"];
    let full: Vec<Runner> = names.iter().map(|n| entry(n, 1)).collect();
    let program = RaceProgram::from_runners(&full);
    let scope = vec![RaceKey::new(VENUE, today(), 1)];
    let lock = ReconciliationLock::new();
    let store = ProfileStore::new();

    for mask in 0u32..(1 << names.len()) - 1 {
        let subset: Vec<Runner> = full
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, r)| r.clone())
            .collect();
        let races = calibrate(&subset, &store);
        let result = lock.reconcile(&scope, &races, &program);
        assert!(
            matches!(result, Err(GanyanError::DataIncomplete { .. })),
            "subset mask {:05b} reconciled",
            mask
        );
    }

    let races = calibrate(&full, &store);
    assert!(lock.reconcile(&scope, &races, &program).is_ok());
}

#[test]
fn missing_entrants_are_listed() {
    let full: Vec<Runner> = ["A", "B", "C"].iter().map(|n| entry(n, 2)).collect();
    let program = RaceProgram::from_runners(&full);
    let races = calibrate(&full[..1], &ProfileStore::new());

    let err = ReconciliationLock::new()
        .reconcile(&[RaceKey::new(VENUE, today(), 2)], &races, &program)
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("missing entrants [B, C]"), "{message}");
}

/// Six races of five runners; race 3 and race 5 each have one proven winner,
/// and race 5 also has a placed runner which narrows its gap.
fn six_race_card() -> (Vec<Runner>, ProfileStore) {
    let mut store = ProfileStore::new();
    let past = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
    store.ingest(&Runner::new("R3H0", RaceKey::new(VENUE, past, 1), Surface::Dirt, 1400).with_rank(1));
    store.ingest(&Runner::new("R5H0", RaceKey::new(VENUE, past, 2), Surface::Dirt, 1400).with_rank(1));
    store.ingest(&Runner::new("R5H1", RaceKey::new(VENUE, past, 2), Surface::Dirt, 1400).with_rank(2));

    let program = (1..=6)
        .flat_map(|race_no| (0..5).map(move |i| entry(&format!("R{race_no}H{i}"), race_no)))
        .collect();
    (program, store)
}

#[test]
fn six_leg_sequence_with_single_banko_leg() {
    let (program, store) = six_race_card();
    let races = calibrate(&program, &store);
    let entries = RaceProgram::from_runners(&program);

    let coupons = SequenceBuilder::new()
        .build(VENUE, today(), &races, &entries)
        .expect("races 1-6 form a sequence");
    assert_eq!(coupons.len(), 1);

    let coupon = &coupons[0];
    assert_eq!(coupon.race_numbers, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(coupon.banko_leg, Some(3), "widest-gap banko is race 3");
    assert_eq!(coupon.legs[2].economy, vec!["R3H0".to_string()]);
    assert_eq!(coupon.legs[2].wide, vec!["R3H0".to_string()]);

    // Narrower gap in race 5 keeps it a full leg
    assert!(!coupon.legs[4].banko);
    assert_eq!(coupon.legs[4].economy.len(), 2);
    assert_eq!(coupon.legs[4].economy[0], "R5H0");

    assert_eq!(coupon.economy_combinations(), 32);
    assert_eq!(coupon.wide_combinations(), 1024);
    assert!(coupon.risky_legs.is_empty());
}

#[test]
fn sequence_refuses_incomplete_leg() {
    let (program, store) = six_race_card();
    let entries = RaceProgram::from_runners(&program);
    // Race 4 loses one scored runner
    let scored_program: Vec<Runner> = program.iter().filter(|r| r.name != "R4H2").cloned().collect();
    let races = calibrate(&scored_program, &store);

    let err = SequenceBuilder::new()
        .build(VENUE, today(), &races, &entries)
        .unwrap_err();
    match err {
        GanyanError::DataIncomplete { race, missing } => {
            assert_eq!(race.race_no, 4);
            assert_eq!(missing, vec!["R4H2".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn short_card_has_no_sequence() {
    let program: Vec<Runner> = (1..=4).map(|n| entry(&format!("H{n}"), n)).collect();
    let races = calibrate(&program, &ProfileStore::new());
    let err = SequenceBuilder::new()
        .build(VENUE, today(), &races, &RaceProgram::from_runners(&program))
        .unwrap_err();
    match err {
        GanyanError::NoSequence { available, .. } => assert_eq!(available, vec![1, 2, 3, 4]),
        other => panic!("unexpected error: {other}"),
    }
}
