//! Monte Carlo season forecasting: replay the remaining schedule many
//! times, scoring each fixture with the sport's calibrated model and
//! advancing run-local ratings with the live engine.
//!
//! Runs are embarrassingly parallel: each owns a private copy of the
//! ratings and standings and writes only to its own accumulator. The only
//! synchronization is the final reduction, which is commutative and
//! associative.

use crate::data_processing::{Fixture, MatchRecord, Phase};
use crate::models::ScoreModel;
use crate::rating::{RatingEngine, TeamsByName};
use itertools::Itertools;
use overload::overload;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops;

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub runs: usize,
    pub seed: u64,
    pub qualification_slots: usize,
    pub relegation_slots: usize,
    pub points_win: u32,
    pub points_draw: u32,
    pub points_loss: u32,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            runs: 10_000,
            seed: 42,
            qualification_slots: 4,
            relegation_slots: 2,
            points_win: 3,
            points_draw: 1,
            points_loss: 0,
        }
    }
}

struct IndexedFixture {
    a: usize,
    b: usize,
    match_index: usize,
    phase: Phase,
}

/// Frozen season snapshot shared read-only across all simulation tasks.
pub struct SeasonState {
    pub team_names: Vec<String>,
    ratings: Vec<f64>,
    points: Vec<u32>,
    score_diff: Vec<i64>,
    fixtures: Vec<IndexedFixture>,
    total_matches: usize,
}

impl SeasonState {
    /// Builds the snapshot from the post-replay team map, the played
    /// records (for current standings), and the remaining schedule. Teams
    /// appearing only in the schedule enter at `default_rating`.
    pub fn from_history(
        teams: &TeamsByName,
        played: &[MatchRecord],
        schedule: &[Fixture],
        total_matches: usize,
        settings: &ForecastSettings,
        default_rating: f64,
    ) -> Self {
        let mut names: BTreeSet<String> = teams.keys().cloned().collect();
        for fx in schedule {
            names.insert(fx.team_a.clone());
            names.insert(fx.team_b.clone());
        }
        let team_names: Vec<String> = names.into_iter().collect();
        let index: HashMap<&str, usize> = team_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let ratings = team_names
            .iter()
            .map(|name| {
                teams
                    .get(name)
                    .map_or(default_rating, |team| team.borrow().rating)
            })
            .collect();

        let mut points = vec![0u32; team_names.len()];
        let mut score_diff = vec![0i64; team_names.len()];
        for rec in played {
            let a = index[rec.team_a.as_str()];
            let b = index[rec.team_b.as_str()];
            let (pa, pb) = match rec.score_a.cmp(&rec.score_b) {
                std::cmp::Ordering::Greater => (settings.points_win, settings.points_loss),
                std::cmp::Ordering::Equal => (settings.points_draw, settings.points_draw),
                std::cmp::Ordering::Less => (settings.points_loss, settings.points_win),
            };
            points[a] += pa;
            points[b] += pb;
            score_diff[a] += rec.score_a as i64 - rec.score_b as i64;
            score_diff[b] += rec.score_b as i64 - rec.score_a as i64;
        }

        let fixtures = schedule
            .iter()
            .map(|fx| IndexedFixture {
                a: index[fx.team_a.as_str()],
                b: index[fx.team_b.as_str()],
                match_index: fx.match_index,
                phase: fx.phase,
            })
            .collect();

        Self {
            team_names,
            ratings,
            points,
            score_diff,
            fixtures,
            total_matches,
        }
    }

    pub fn num_teams(&self) -> usize {
        self.team_names.len()
    }
}

/// Per-run outcome counts; merged across the worker pool.
pub struct ForecastTotals {
    pub runs: u64,
    champion: Vec<u64>,
    qualified: Vec<u64>,
    relegated: Vec<u64>,
    rank_sum: Vec<u64>,
    fixture_outcomes: Vec<[u64; 3]>,
    fixture_scores: Vec<HashMap<(u32, u32), u64>>,
}

impl ForecastTotals {
    fn new(num_teams: usize, num_fixtures: usize) -> Self {
        Self {
            runs: 0,
            champion: vec![0; num_teams],
            qualified: vec![0; num_teams],
            relegated: vec![0; num_teams],
            rank_sum: vec![0; num_teams],
            fixture_outcomes: vec![[0; 3]; num_fixtures],
            fixture_scores: vec![HashMap::new(); num_fixtures],
        }
    }
}

overload!((a: ?ForecastTotals) + (b: ?ForecastTotals) -> ForecastTotals {
    let zip_add = |x: &[u64], y: &[u64]| x.iter().zip(y).map(|(u, v)| u + v).collect();
    let mut fixture_scores = a.fixture_scores.clone();
    for (merged, other) in fixture_scores.iter_mut().zip(b.fixture_scores.iter()) {
        for (&score, &count) in other {
            *merged.entry(score).or_insert(0) += count;
        }
    }
    ForecastTotals {
        runs: a.runs + b.runs,
        champion: zip_add(&a.champion, &b.champion),
        qualified: zip_add(&a.qualified, &b.qualified),
        relegated: zip_add(&a.relegated, &b.relegated),
        rank_sum: zip_add(&a.rank_sum, &b.rank_sum),
        fixture_outcomes: a.fixture_outcomes.iter().zip(b.fixture_outcomes.iter())
            .map(|(x, y)| [x[0] + y[0], x[1] + y[1], x[2] + y[2]])
            .collect(),
        fixture_scores,
    }
});

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn simulate_run(
    state: &SeasonState,
    engine: &RatingEngine,
    model: &dyn ScoreModel,
    settings: &ForecastSettings,
    seed: u64,
    totals: &mut ForecastTotals,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ratings = state.ratings.clone();
    let mut points = state.points.clone();
    let mut score_diff = state.score_diff.clone();

    for (slot, fx) in state.fixtures.iter().enumerate() {
        let (score_a, score_b) = model.simulate(ratings[fx.a], ratings[fx.b], &mut rng);
        let outcome = match score_a.cmp(&score_b) {
            std::cmp::Ordering::Greater => {
                points[fx.a] += settings.points_win;
                points[fx.b] += settings.points_loss;
                0
            }
            std::cmp::Ordering::Equal => {
                points[fx.a] += settings.points_draw;
                points[fx.b] += settings.points_draw;
                1
            }
            std::cmp::Ordering::Less => {
                points[fx.a] += settings.points_loss;
                points[fx.b] += settings.points_win;
                2
            }
        };
        score_diff[fx.a] += score_a as i64 - score_b as i64;
        score_diff[fx.b] += score_b as i64 - score_a as i64;
        totals.fixture_outcomes[slot][outcome] += 1;
        *totals.fixture_scores[slot]
            .entry((score_a, score_b))
            .or_insert(0) += 1;

        let delta = engine.compute_update(
            ratings[fx.a],
            ratings[fx.b],
            score_a,
            score_b,
            fx.phase,
            fx.match_index,
            state.total_matches,
        );
        ratings[fx.a] += delta;
        ratings[fx.b] -= delta;
    }

    // Terminal standings: points, then score difference, then name.
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| {
        points[j]
            .cmp(&points[i])
            .then(score_diff[j].cmp(&score_diff[i]))
            .then(state.team_names[i].cmp(&state.team_names[j]))
    });
    for (rank, &team) in order.iter().enumerate() {
        totals.rank_sum[team] += rank as u64 + 1;
        if rank == 0 {
            totals.champion[team] += 1;
        }
        if rank < settings.qualification_slots {
            totals.qualified[team] += 1;
        }
        if rank + settings.relegation_slots >= points.len() {
            totals.relegated[team] += 1;
        }
    }
    totals.runs += 1;
}

#[derive(Clone, Debug, Serialize)]
pub struct TeamForecast {
    pub team: String,
    pub current_rating: f64,
    pub expected_position: f64,
    pub champion_prob: f64,
    pub qualification_prob: f64,
    pub relegation_prob: f64,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ScoreFrequency {
    pub score_a: u32,
    pub score_b: u32,
    pub probability: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct FixtureForecast {
    pub team_a: String,
    pub team_b: String,
    pub match_index: usize,
    pub win_a_prob: f64,
    pub draw_prob: f64,
    pub win_b_prob: f64,
    pub expected_score_a: f64,
    pub expected_score_b: f64,
    pub score_distribution: Vec<ScoreFrequency>,
}

pub struct Forecast {
    pub runs: u64,
    pub teams: Vec<TeamForecast>,
    pub fixtures: Vec<FixtureForecast>,
}

/// Runs the full Monte Carlo forecast on the rayon worker pool and
/// aggregates frequencies into probabilities.
pub fn run_forecast(
    state: &SeasonState,
    engine: &RatingEngine,
    model: &dyn ScoreModel,
    settings: &ForecastSettings,
) -> Forecast {
    let num_teams = state.num_teams();
    let num_fixtures = state.fixtures.len();
    let totals = (0..settings.runs as u64)
        .into_par_iter()
        .fold(
            || ForecastTotals::new(num_teams, num_fixtures),
            |mut acc, run| {
                // Independent stream per run: reproducible, uncorrelated.
                let seed = splitmix64(settings.seed ^ splitmix64(run));
                simulate_run(state, engine, model, settings, seed, &mut acc);
                acc
            },
        )
        .reduce(|| ForecastTotals::new(num_teams, num_fixtures), |a, b| a + b);

    aggregate(state, totals)
}

fn aggregate(state: &SeasonState, totals: ForecastTotals) -> Forecast {
    let runs = totals.runs.max(1) as f64;
    let teams = state
        .team_names
        .iter()
        .enumerate()
        .map(|(i, name)| TeamForecast {
            team: name.clone(),
            current_rating: state.ratings[i],
            expected_position: totals.rank_sum[i] as f64 / runs,
            champion_prob: totals.champion[i] as f64 / runs,
            qualification_prob: totals.qualified[i] as f64 / runs,
            relegation_prob: totals.relegated[i] as f64 / runs,
        })
        .collect();

    let fixtures = state
        .fixtures
        .iter()
        .enumerate()
        .map(|(slot, fx)| {
            let outcomes = totals.fixture_outcomes[slot];
            let scores = &totals.fixture_scores[slot];
            let expected_score_a = scores
                .iter()
                .map(|(&(a, _), &count)| a as f64 * count as f64)
                .sum::<f64>()
                / runs;
            let expected_score_b = scores
                .iter()
                .map(|(&(_, b), &count)| b as f64 * count as f64)
                .sum::<f64>()
                / runs;
            let score_distribution = scores
                .iter()
                .map(|(&(a, b), &count)| ScoreFrequency {
                    score_a: a,
                    score_b: b,
                    probability: count as f64 / runs,
                })
                .sorted_by(|x, y| {
                    y.probability
                        .total_cmp(&x.probability)
                        .then((x.score_a, x.score_b).cmp(&(y.score_a, y.score_b)))
                })
                .collect();
            FixtureForecast {
                team_a: state.team_names[fx.a].clone(),
                team_b: state.team_names[fx.b].clone(),
                match_index: fx.match_index,
                win_a_prob: outcomes[0] as f64 / runs,
                draw_prob: outcomes[1] as f64 / runs,
                win_b_prob: outcomes[2] as f64 / runs,
                expected_score_a,
                expected_score_b,
                score_distribution,
            }
        })
        .collect();

    Forecast {
        runs: totals.runs,
        teams,
        fixtures,
    }
}

/// Mean Brier score of the fixture forecasts against realized results,
/// matched by chronological index. Skips fixtures with no result.
pub fn brier_score(fixtures: &[FixtureForecast], results: &[MatchRecord]) -> Option<f64> {
    let by_index: HashMap<usize, &MatchRecord> =
        results.iter().map(|rec| (rec.match_index, rec)).collect();
    let mut sum = 0.;
    let mut n = 0usize;
    for fx in fixtures {
        let Some(rec) = by_index.get(&fx.match_index) else {
            continue;
        };
        let actual = match rec.score_a.cmp(&rec.score_b) {
            std::cmp::Ordering::Greater => [1., 0., 0.],
            std::cmp::Ordering::Equal => [0., 1., 0.],
            std::cmp::Ordering::Less => [0., 0., 1.],
        };
        let predicted = [fx.win_a_prob, fx.draw_prob, fx.win_b_prob];
        sum += predicted
            .iter()
            .zip(actual.iter())
            .map(|(p, y)| (p - y) * (p - y))
            .sum::<f64>();
        n += 1;
    }
    if n == 0 { None } else { Some(sum / n as f64) }
}
