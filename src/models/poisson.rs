//! Gamma-noised Poisson scoring for discrete low-score sports.

use super::ScoreModel;
use crate::calibrate::CalibratedParams;
use crate::rating::elo_expected;
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma, Poisson};

/// Base means past this behave like high-scoring count sports and get the
/// tighter noise band, since relative swings compound with the count scale.
const HIGH_SCORING_MEAN: f64 = 10.;
const NOISE_BAND_HIGH: (f64, f64) = (0.75, 1.30);
const NOISE_BAND_LOW: (f64, f64) = (0.5, 1.8);
/// Hard cap on the final rate, relative to the calibrated base.
const MAX_RATE_RATIO: f64 = 2.5;
const MIN_RATE: f64 = 0.05;
/// Attempts to resolve an accidental tie before nudging the favorite.
const TIE_RESAMPLES: usize = 8;

#[derive(Debug)]
pub struct PoissonScore {
    pub params: CalibratedParams,
    pub e_factor: f64,
    pub draw_eligible: bool,
}

impl PoissonScore {
    // edge is the normalized strength edge 2E - 1, in [-1, 1].
    fn side_rate(&self, edge: f64, rng: &mut StdRng) -> f64 {
        let base = self.params.base_mean;
        let adjusted = base * (1. + edge * self.params.adjustment_limit);
        let shape = self.params.dispersion;
        // Mean-preserving multiplicative noise: Gamma(k, 1/k) has mean 1.
        let noise = Gamma::new(shape, shape.recip())
            .expect("dispersion shape is positive")
            .sample(rng);
        let band = if base > HIGH_SCORING_MEAN {
            NOISE_BAND_HIGH
        } else {
            NOISE_BAND_LOW
        };
        (adjusted * noise.clamp(band.0, band.1)).clamp(MIN_RATE, base * MAX_RATE_RATIO)
    }
}

fn sample_count(rate: f64, rng: &mut StdRng) -> u32 {
    Poisson::new(rate.max(MIN_RATE))
        .expect("rate is positive and finite")
        .sample(rng) as u32
}

impl ScoreModel for PoissonScore {
    fn simulate(&self, rating_a: f64, rating_b: f64, rng: &mut StdRng) -> (u32, u32) {
        if self.draw_eligible {
            let p_draw = self
                .params
                .draw_model
                .draw_probability(rating_a - rating_b);
            if rng.random::<f64>() < p_draw {
                let shared = sample_count(self.params.base_mean, rng);
                return (shared, shared);
            }
        }

        let edge = 2. * elo_expected(rating_a, rating_b, self.e_factor) - 1.;
        let rate_a = self.side_rate(edge, rng);
        let rate_b = self.side_rate(-edge, rng);
        let mut score = (sample_count(rate_a, rng), sample_count(rate_b, rng));
        // The draw question was already settled above, so accidental ties
        // get resampled, with a bounded nudge as the last resort.
        let mut attempts = 0;
        while score.0 == score.1 {
            if attempts == TIE_RESAMPLES {
                if rate_a >= rate_b {
                    score.0 += 1;
                } else {
                    score.1 += 1;
                }
                break;
            }
            score = (sample_count(rate_a, rng), sample_count(rate_b, rng));
            attempts += 1;
        }
        score
    }
}
