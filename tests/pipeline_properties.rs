use chrono::{Days, NaiveDate};
use std::collections::HashSet;

use ganyan::strategy::{DecisionEngine, ScoreCalibrator, TicketComposer};
use ganyan::{OracleSignals, ProfileStore, RaceKey, RaceRisk, Runner, Surface};

/// Small deterministic generator so the streams are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

const HORSES: &[&str] = &["Karayel", "Poyraz", "Lodos", "Bora", "Imbat", "Meltem", "Yildiz", "Firtina"];

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, 1).unwrap() + Days::new(offset)
}

/// Forty race days, one race each, random field and finishing order
fn result_stream(seed: u64) -> Vec<Runner> {
    let mut rng = Lcg(seed);
    let surfaces = [Surface::Dirt, Surface::Turf, Surface::Synthetic];
    let mut rows = Vec::new();
    for d in 0..40 {
        let field = 3 + rng.below(HORSES.len() as u64 - 2) as usize;
        let mut names: Vec<&str> = HORSES.to_vec();
        for i in (1..names.len()).rev() {
            names.swap(i, rng.below(i as u64 + 1) as usize);
        }
        let surface = surfaces[rng.below(3) as usize];
        let distance = 1000 + 200 * rng.below(8) as u32;
        for (pos, name) in names.into_iter().take(field).enumerate() {
            let mut runner = Runner::new(name, RaceKey::new("Ankara", day(d), 1), surface, distance)
                .with_rank(pos as u32 + 1)
                .with_agf(1.0 + rng.below(40) as f64);
            if rng.below(10) == 0 {
                runner.finish_rank = None;
            }
            rows.push(runner);
        }
    }
    rows
}

#[test]
fn profile_rates_stay_bounded_and_ordered() {
    let mut store = ProfileStore::new();
    store.ingest_day(&result_stream(7));

    assert!(!store.is_empty());
    for profile in store.profiles() {
        let (win, place) = (profile.win_rate(), profile.place_rate());
        assert!((0.0..=100.0).contains(&win), "{} win rate {}", profile.name, win);
        assert!((0.0..=100.0).contains(&place), "{} place rate {}", profile.name, place);
        if profile.starts > 0 {
            assert!(place >= win, "{}: place {} < win {}", profile.name, place, win);
        }
    }
}

#[test]
fn warm_up_order_does_not_change_profiles() {
    let stream = result_stream(11);
    let end = day(40);

    let mut chronological = ProfileStore::new();
    chronological.ingest_day(&stream);

    let mut shuffled = stream.clone();
    let mut rng = Lcg(99);
    for i in (1..shuffled.len()).rev() {
        shuffled.swap(i, rng.below(i as u64 + 1) as usize);
    }
    let mut warmed = ProfileStore::new();
    warmed.warm_up(&shuffled, end);

    for name in HORSES {
        assert_eq!(chronological.get(name), warmed.get(name), "profile of {name} differs");
    }
}

#[test]
fn surprise_open_always_returns_two_distinct_picks() {
    let composer = TicketComposer::default();
    let calibrator = ScoreCalibrator::default();
    let engine = DecisionEngine::default();
    let mut rng = Lcg(3);

    let mut store = ProfileStore::new();
    store.ingest_day(&result_stream(5));
    let today = day(41);

    for race_no in 1..=60u32 {
        let field = 2 + rng.below(HORSES.len() as u64 - 1) as usize;
        let program: Vec<Runner> = HORSES
            .iter()
            .take(field)
            .map(|name| {
                let mut r = Runner::new(*name, RaceKey::new("Ankara", today, race_no), Surface::Dirt, 1400);
                if rng.below(2) == 0 {
                    r = r.with_agf(1.0 + rng.below(30) as f64);
                }
                if rng.below(3) == 0 {
                    r.signals = OracleSignals {
                        win_prob: Some(rng.below(100) as f64 / 100.0),
                        surprise_prob: (rng.below(2) == 0).then(|| rng.below(100) as f64 / 100.0),
                        ..Default::default()
                    };
                }
                r
            })
            .collect();

        let races = calibrator.calibrate(&engine.score(&program, &store));
        let selection = composer.compose(&races[0], RaceRisk::SurpriseOpen, None);
        let distinct: HashSet<&str> = selection.picks.iter().map(|p| p.name.as_str()).collect();
        assert!(
            distinct.len() >= 2,
            "race {race_no} with {field} runners produced {:?}",
            selection.pick_names().collect::<Vec<_>>()
        );
        assert_eq!(distinct.len(), selection.picks.len(), "duplicate picks in race {race_no}");
    }
}
