//! Scoring models: one strategy per sport family, selected once at
//! configuration-load time rather than re-dispatched per call.

mod gaussian;
mod poisson;
mod sets;
mod strength;

pub use gaussian::GaussianScore;
pub use poisson::PoissonScore;
pub use sets::{SetScore, normalize_set_tally};
pub use strength::StrengthScore;

use crate::calibrate::CalibratedParams;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// The four scoring archetypes the league distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SportFamily {
    /// Discrete low-scoring count sports (futsal, handball, hockey).
    LowScore,
    /// Continuous high-scoring sports (basketball).
    HighScore,
    /// Set-based sports (volleyball and friends).
    SetBased,
    /// Sports without a scoring model; outcomes only.
    Unmodeled,
}

impl SportFamily {
    /// Bound on how far a strength edge may shift the simulated mean,
    /// relative to the calibrated base.
    pub fn adjustment_limit(self) -> f64 {
        match self {
            SportFamily::LowScore => 0.30,
            SportFamily::HighScore => 0.10,
            SportFamily::SetBased => 0.25,
            SportFamily::Unmodeled => 0.,
        }
    }
}

/// Draws one simulated final score (goals, points, or sets won).
/// Implementations are pure in everything but the RNG and never touch the
/// calibrated parameters they were built with.
pub trait ScoreModel: std::fmt::Debug + Send + Sync {
    fn simulate(&self, rating_a: f64, rating_b: f64, rng: &mut StdRng) -> (u32, u32);
}

pub fn get_score_model(
    family: SportFamily,
    draw_eligible: bool,
    best_of: u32,
    e_factor: f64,
    params: CalibratedParams,
) -> Box<dyn ScoreModel> {
    match family {
        SportFamily::LowScore => Box::new(PoissonScore {
            params,
            e_factor,
            draw_eligible,
        }),
        SportFamily::HighScore => Box::new(GaussianScore { params, e_factor }),
        SportFamily::SetBased => Box::new(SetScore {
            params,
            e_factor,
            first_to: best_of / 2 + 1,
        }),
        SportFamily::Unmodeled => Box::new(StrengthScore {
            params,
            e_factor,
            draw_eligible,
        }),
    }
}
