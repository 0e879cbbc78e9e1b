//! Outcome-only model for sports without a calibrated scoring archetype.
//! Keeps them in the standings without inventing score distributions.

use super::ScoreModel;
use crate::calibrate::CalibratedParams;
use crate::rating::elo_expected;
use rand::Rng;
use rand::rngs::StdRng;

#[derive(Debug)]
pub struct StrengthScore {
    pub params: CalibratedParams,
    pub e_factor: f64,
    pub draw_eligible: bool,
}

impl ScoreModel for StrengthScore {
    fn simulate(&self, rating_a: f64, rating_b: f64, rng: &mut StdRng) -> (u32, u32) {
        if self.draw_eligible {
            let p_draw = self
                .params
                .draw_model
                .draw_probability(rating_a - rating_b);
            if rng.random::<f64>() < p_draw {
                return (0, 0);
            }
        }
        let expected = elo_expected(rating_a, rating_b, self.e_factor);
        if rng.random::<f64>() < expected {
            (1, 0)
        } else {
            (0, 1)
        }
    }
}
