//! json5-driven configuration for a full forecasting pipeline run: one
//! file describes the sport, the season shape, and every tunable the core
//! components expose, so nothing lives in module-level state.

use crate::calibrate::{CalibratedParams, CalibrationLimits, calibrate};
use crate::data_processing::{Fixture, MatchRecord, load_records, load_schedule};
use crate::forecast::{Forecast, ForecastSettings, SeasonState, run_forecast};
use crate::models::{SportFamily, get_score_model, normalize_set_tally};
use crate::rating::{RatingEngine, TeamsByName, replay_history};
use serde::Deserialize;
use std::path::Path;

fn default_best_of() -> u32 {
    5
}

fn default_noob() -> f64 {
    1500.
}

fn default_promoted_rating() -> f64 {
    1400.
}

#[derive(Deserialize, Debug)]
pub struct SportSpec {
    pub name: String,
    pub family: SportFamily,
    #[serde(default)]
    pub draw_eligible: bool,
    #[serde(default = "default_best_of")]
    pub best_of: u32,
}

#[derive(Deserialize, Debug)]
pub struct ForecastConfig {
    pub sport: SportSpec,
    pub division: String,
    pub history_path: String,
    pub schedule_path: String,
    /// Regular-season length in matches; fixtures past it are playoffs.
    pub total_matches: usize,
    #[serde(default)]
    pub engine: RatingEngine,
    #[serde(default)]
    pub limits: CalibrationLimits,
    #[serde(default)]
    pub settings: ForecastSettings,
    #[serde(default = "default_noob")]
    pub rating_noob: f64,
    #[serde(default = "default_promoted_rating")]
    pub rating_promoted: f64,
    /// Teams entering this division from below; they seed lower.
    #[serde(default)]
    pub promoted: Vec<String>,
}

impl ForecastConfig {
    pub fn from_file(source: impl AsRef<Path>) -> Self {
        // json5 rather than serde_json, so configs may carry comments
        let raw = std::fs::read_to_string(source).expect("Failed to read config file");
        json5::from_str(&raw).expect("Failed to parse config as JSON")
    }
}

/// A fully wired pipeline: history and schedule loaded, components
/// configured. `eval` runs rating replay, calibration, and the forecast.
pub struct SeasonPipeline {
    pub config: ForecastConfig,
    pub history: Vec<MatchRecord>,
    pub schedule: Vec<Fixture>,
}

pub struct PipelineResults {
    pub teams: TeamsByName,
    pub params: CalibratedParams,
    pub forecast: Forecast,
    pub secs_elapsed: f64,
}

impl SeasonPipeline {
    pub fn from_config(config: ForecastConfig) -> Self {
        tracing::info!(
            "Season pipeline for {} / {}:\n{:?}",
            config.sport.name,
            config.division,
            config
        );
        let mut history = load_records(&config.history_path);
        if config.sport.family == SportFamily::SetBased {
            normalize_set_history(&mut history, config.sport.best_of / 2 + 1);
        }
        let schedule = load_schedule(&config.schedule_path);
        Self {
            config,
            history,
            schedule,
        }
    }

    pub fn eval(&self) -> PipelineResults {
        let config = &self.config;
        let now = std::time::Instant::now();

        let mut teams = TeamsByName::new();
        let gaps = replay_history(
            &config.engine,
            &mut teams,
            &self.history,
            config.total_matches,
            |name| {
                if config.promoted.iter().any(|p| p == name) {
                    config.rating_promoted
                } else {
                    config.rating_noob
                }
            },
        );

        let params = calibrate(&self.history, &gaps, config.sport.family, &config.limits);
        tracing::info!("Calibrated parameters: {:?}", params);

        let model = get_score_model(
            config.sport.family,
            config.sport.draw_eligible,
            config.sport.best_of,
            config.engine.e_factor,
            params.clone(),
        );
        let state = SeasonState::from_history(
            &teams,
            &self.history,
            &self.schedule,
            config.total_matches,
            &config.settings,
            config.rating_noob,
        );
        let forecast = run_forecast(&state, &config.engine, &*model, &config.settings);
        let secs_elapsed = now.elapsed().as_nanos() as f64 * 1e-9;

        PipelineResults {
            teams,
            params,
            forecast,
            secs_elapsed,
        }
    }
}

// Best-effort repair of malformed set tallies at the data boundary.
fn normalize_set_history(history: &mut [MatchRecord], first_to: u32) {
    for rec in history {
        let ((score_a, score_b), repaired) =
            normalize_set_tally(rec.score_a, rec.score_b, first_to);
        if repaired {
            tracing::warn!(
                "Repaired set tally {}-{} -> {}-{} for {} vs {} (match {})",
                rec.score_a,
                rec.score_b,
                score_a,
                score_b,
                rec.team_a,
                rec.team_b,
                rec.match_index
            );
            rec.score_a = score_a;
            rec.score_b = score_b;
        }
    }
}
