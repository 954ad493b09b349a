//! Evidence bullets for a chosen runner.
//!
//! Only signals actually present on the runner produce a bullet; nothing is
//! inferred or invented.

use super::calibrator::CalibratedRunner;

const HIGH_CONFIDENCE: f64 = 0.7;
const GOOD_CONFIDENCE: f64 = 0.5;
const IN_FORM_WIN_RATE: f64 = 0.3;
const CONSISTENT_AVG_RANK: f64 = 2.5;
const SPECIALIST_RATIO: f64 = 1.2;
const COURSE_WIN_RATE: f64 = 0.4;
const VALUE_WIN_PROB: f64 = 0.30;
const VALUE_AGF_MAX: f64 = 10.0;

pub const FALLBACK_BULLET: &str = "General model preference.";

/// Build up to `max_bullets` evidence bullets for a runner picked with `score`
pub fn generate_rationale(runner: &CalibratedRunner, score: f64, max_bullets: usize) -> Vec<String> {
    let entry = &runner.scored.runner;
    let evidence = &runner.scored.evidence;
    let signals = &entry.signals;
    let mut bullets = Vec::new();

    if score > HIGH_CONFIDENCE {
        bullets.push(format!("High model confidence: {score:.2} (very strong)"));
    } else if score > GOOD_CONFIDENCE {
        bullets.push(format!("Good model confidence: {score:.2}"));
    }

    if let Some(rate) = evidence.last5_win_rate.filter(|&r| r > IN_FORM_WIN_RATE) {
        bullets.push(format!("In form: won {:.0}% of the last 5 starts", rate * 100.0));
    }

    if let Some(avg) = evidence.last5_avg_rank.filter(|&a| a <= CONSISTENT_AVG_RANK) {
        bullets.push(format!("Consistent: average finish {avg:.1} over the last 5 starts"));
    }

    let track = signals.track_specialization.or(evidence.track_specialization);
    if let Some(ratio) = track.filter(|&r| r > SPECIALIST_RATIO) {
        bullets.push(format!(
            "Surface specialist: {:.0}% better on this surface than overall",
            (ratio - 1.0) * 100.0
        ));
    }

    let distance = signals.distance_specialization.or(evidence.distance_specialization);
    if let Some(ratio) = distance.filter(|&r| r > SPECIALIST_RATIO) {
        bullets.push(format!("Distance specialist: likes this trip (ratio {ratio:.2})"));
    }

    if let Some(rate) = evidence.same_track_win_rate.filter(|&r| r > COURSE_WIN_RATE) {
        bullets.push(format!("Course winner: {:.0}% win rate at this track", rate * 100.0));
    }

    if let Some(reason) = signals.surprise_reason.as_deref().filter(|r| !r.trim().is_empty()) {
        bullets.push(format!("Surprise angle: {reason}"));
    }

    if let (Some(win), Some(agf)) = (signals.win_prob, entry.agf) {
        if win > VALUE_WIN_PROB && agf < VALUE_AGF_MAX {
            bullets.push(format!(
                "Value bet: model gives {:.0}% to win but public confidence is only {agf:.1}%",
                win * 100.0
            ));
        }
    }

    if bullets.is_empty() {
        bullets.push(FALLBACK_BULLET.to_string());
    }
    bullets.truncate(max_bullets);
    bullets
}
