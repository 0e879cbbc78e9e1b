//! The live rating system: a modified ELO with a dynamically scaled
//! update factor, tuned for small amateur leagues with volatile rosters.

use crate::data_processing::{MatchRecord, Phase};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TeamEvent {
    pub match_index: usize,
    pub rating: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub rating: f64,
    pub event_history: Vec<TeamEvent>,
}

impl Team {
    pub fn with_rating(name: impl Into<String>, rating: f64) -> Self {
        Self {
            name: name.into(),
            rating,
            event_history: vec![],
        }
    }
}

pub type TeamsByName = HashMap<String, RefCell<Team>>;

/// Expected score of side A under the ELO logistic curve.
pub fn elo_expected(rating_a: f64, rating_b: f64, e_factor: f64) -> f64 {
    (1. + 10f64.powf((rating_b - rating_a) / e_factor)).recip()
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct RatingEngine {
    // base learning rate, before the phase and margin multipliers
    pub k_base: f64,
    // spread of the expected-score curve; wider than the classical 400
    // to reflect amateur-team volatility
    pub e_factor: f64,
    pub third_place_mult: f64,
    pub playoff_mult: f64,
    // ceiling on the opening-third multiplier, whose raw formula diverges
    // for the first couple of fixtures of a long season
    pub early_mult_cap: f64,
}

impl Default for RatingEngine {
    fn default() -> Self {
        Self {
            k_base: 100.,
            e_factor: 250.,
            third_place_mult: 0.75,
            playoff_mult: 1.5,
            early_mult_cap: 3.0,
        }
    }
}

fn margin_multiplier(score_a: u32, score_b: u32) -> f64 {
    let hi = score_a.max(score_b) as f64;
    let lo = score_a.min(score_b) as f64;
    if hi == lo {
        return 1.;
    }
    // Tenth root dampens blowouts; the 0.5 floor handles shutouts.
    (hi / lo.max(0.5)).powf(0.1)
}

impl RatingEngine {
    pub fn expected_score(&self, rating_a: f64, rating_b: f64) -> f64 {
        elo_expected(rating_a, rating_b, self.e_factor)
    }

    /// `total_matches` is the regular-season length; playoff fixtures are
    /// the ones whose index runs past it.
    fn phase_multiplier(&self, phase: Phase, match_index: usize, total_matches: usize) -> f64 {
        if phase == Phase::ThirdPlace {
            return self.third_place_mult;
        }
        if match_index > total_matches {
            return self.playoff_mult;
        }
        let frac = match_index as f64 / total_matches.max(1) as f64;
        if frac < 1. / 3. {
            // 1 / log_16(4 * progress), progress = fractional position on [0, 8].
            // Starts above 2 and decays toward 1 across the opening third.
            let arg = 4. * 8. * frac;
            if arg <= 1. {
                return self.early_mult_cap;
            }
            arg.log(16.).recip().clamp(1., self.early_mult_cap)
        } else {
            1.
        }
    }

    /// Rating change for side A; side B's change is the exact negation, so
    /// the update is zero-sum by construction. Pure: the Monte Carlo runs
    /// use this directly on flat rating vectors.
    pub fn compute_update(
        &self,
        rating_a: f64,
        rating_b: f64,
        score_a: u32,
        score_b: u32,
        phase: Phase,
        match_index: usize,
        total_matches: usize,
    ) -> f64 {
        let expected = self.expected_score(rating_a, rating_b);
        let actual = match score_a.cmp(&score_b) {
            Ordering::Greater => 1.,
            Ordering::Equal => 0.5,
            Ordering::Less => 0.,
        };
        let k = self.k_base
            * self.phase_multiplier(phase, match_index, total_matches)
            * margin_multiplier(score_a, score_b);
        k * (actual - expected)
    }

    /// Applies one match: mutates both ratings and appends history events.
    /// Garbage scores must be rejected upstream; there are no error paths.
    pub fn update(
        &self,
        team_a: &mut Team,
        team_b: &mut Team,
        score_a: u32,
        score_b: u32,
        phase: Phase,
        match_index: usize,
        total_matches: usize,
    ) -> (f64, f64) {
        let delta = self.compute_update(
            team_a.rating,
            team_b.rating,
            score_a,
            score_b,
            phase,
            match_index,
            total_matches,
        );
        team_a.rating += delta;
        team_b.rating -= delta;
        team_a.event_history.push(TeamEvent {
            match_index,
            rating: team_a.rating,
        });
        team_b.event_history.push(TeamEvent {
            match_index,
            rating: team_b.rating,
        });
        (delta, -delta)
    }
}

/// Replays an ordered season through the engine, seeding newcomers at the
/// baseline chosen by `baseline`. Returns the strength gap
/// (rating_a - rating_b) observed before each match, aligned with
/// `records`; the calibrator consumes these as its strength-before-match
/// inputs. Absence-flagged matches are still rated here, as in the live
/// season run.
pub fn replay_history(
    engine: &RatingEngine,
    teams: &mut TeamsByName,
    records: &[MatchRecord],
    total_matches: usize,
    baseline: impl Fn(&str) -> f64,
) -> Vec<f64> {
    let mut gaps = Vec::with_capacity(records.len());
    for rec in records {
        for name in [&rec.team_a, &rec.team_b] {
            teams.entry(name.clone()).or_insert_with(|| {
                RefCell::new(Team::with_rating(name.clone(), baseline(name)))
            });
        }
        let mut team_a = teams[&rec.team_a]
            .try_borrow_mut()
            .expect("A team cannot play itself");
        let mut team_b = teams[&rec.team_b].borrow_mut();
        gaps.push(team_a.rating - team_b.rating);
        engine.update(
            &mut team_a,
            &mut team_b,
            rec.score_a,
            rec.score_b,
            rec.phase,
            rec.match_index,
            total_matches,
        );
    }
    gaps
}

#[cfg(test)]
mod test {
    use super::*;

    fn pair() -> (Team, Team) {
        (
            Team::with_rating("Falcons", 1650.),
            Team::with_rating("Otters", 1580.),
        )
    }

    #[test]
    fn updates_are_zero_sum() {
        let engine = RatingEngine::default();
        let (mut a, mut b) = pair();
        let before = a.rating + b.rating;
        let (delta_a, delta_b) = engine.update(&mut a, &mut b, 4, 1, Phase::Regular, 9, 12);
        assert_eq!(delta_a, -delta_b);
        assert!((a.rating + b.rating - before).abs() < 1e-12);
        assert_eq!(a.event_history.len(), 1);
        assert_eq!(b.event_history[0].match_index, 9);
    }

    #[test]
    fn margin_multiplier_edges() {
        assert_eq!(margin_multiplier(2, 2), 1.);
        assert_eq!(margin_multiplier(0, 0), 1.);
        // 10:1 ratio dampened by the tenth root
        assert!((margin_multiplier(10, 1) - 10f64.powf(0.1)).abs() < 1e-3);
        // shutout hits the 0.5 denominator floor
        assert!((margin_multiplier(3, 0) - 6f64.powf(0.1)).abs() < 1e-12);
    }

    #[test]
    fn regular_season_delta_matches_formula() {
        let engine = RatingEngine::default();
        let (mut a, mut b) = pair();
        // Index in the final two-thirds of a 12-match season: no phase scaling.
        let (delta_a, _) = engine.update(&mut a, &mut b, 3, 2, Phase::Regular, 9, 12);
        let expected = 1. / (1. + 10f64.powf((1580. - 1650.) / 250.));
        let by_hand = 100. * 1.5f64.powf(0.1) * (1. - expected);
        assert!((delta_a - by_hand).abs() < 1e-9);
        assert!((delta_a - 35.84).abs() < 0.05);
    }

    #[test]
    fn third_place_is_three_quarters_of_regular() {
        let engine = RatingEngine::default();
        let (mut a1, mut b1) = pair();
        let (mut a2, mut b2) = pair();
        let (regular, _) = engine.update(&mut a1, &mut b1, 3, 2, Phase::Regular, 9, 12);
        let (third, _) = engine.update(&mut a2, &mut b2, 3, 2, Phase::ThirdPlace, 9, 12);
        assert!((third - 0.75 * regular).abs() < 1e-9);
    }

    #[test]
    fn playoff_detected_by_position() {
        let engine = RatingEngine::default();
        let (mut a1, mut b1) = pair();
        let (mut a2, mut b2) = pair();
        let (regular, _) = engine.update(&mut a1, &mut b1, 3, 2, Phase::Regular, 9, 12);
        // Tagged regular, but positioned past the regular season.
        let (playoff, _) = engine.update(&mut a2, &mut b2, 3, 2, Phase::Regular, 13, 12);
        assert!((playoff - 1.5 * regular).abs() < 1e-9);
    }

    #[test]
    fn opening_third_boosts_learning_rate() {
        let engine = RatingEngine::default();
        // Match 3 of 24: frac = 1/8 puts the raw formula exactly at 2.
        let early = engine.phase_multiplier(Phase::Regular, 3, 24);
        assert!((early - 2.).abs() < 1e-9);
        // The very first fixture of a long season hits the cap.
        let first = engine.phase_multiplier(Phase::Regular, 1, 40);
        assert_eq!(first, engine.early_mult_cap);
        // Past one third, back to neutral.
        assert_eq!(engine.phase_multiplier(Phase::Regular, 9, 24), 1.);
    }

    #[test]
    fn replay_reports_pre_match_gaps() {
        let engine = RatingEngine::default();
        let mut teams = TeamsByName::new();
        let records = vec![
            MatchRecord {
                team_a: "Falcons".into(),
                team_b: "Otters".into(),
                score_a: 2,
                score_b: 0,
                match_index: 10,
                phase: Phase::Regular,
                absence: false,
                season_id: "s".into(),
                date: None,
            },
            MatchRecord {
                team_a: "Otters".into(),
                team_b: "Falcons".into(),
                score_a: 1,
                score_b: 1,
                match_index: 11,
                phase: Phase::Regular,
                absence: false,
                season_id: "s".into(),
                date: None,
            },
        ];
        let gaps = replay_history(&engine, &mut teams, &records, 12, |_| 1500.);
        assert_eq!(gaps.len(), 2);
        // Both newcomers start at the same baseline.
        assert_eq!(gaps[0], 0.);
        // Falcons won the opener, so the rematch gap runs against Otters.
        assert!(gaps[1] < 0.);
        let falcons = teams["Falcons"].borrow();
        assert_eq!(falcons.event_history.len(), 2);
    }
}
