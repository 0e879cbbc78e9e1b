//! Gaussian scoring for continuous high-score sports, with overtime
//! resolution on ties.

use super::ScoreModel;
use crate::calibrate::CalibratedParams;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// Overtime periods add this fraction of the regulation mean and spread.
const OVERTIME_FRACTION: f64 = 0.125;
const MIN_STD: f64 = 1.;

#[derive(Debug)]
pub struct GaussianScore {
    pub params: CalibratedParams,
    pub e_factor: f64,
}

impl GaussianScore {
    // Predicted victory margin from the calibrated regression, signed
    // toward the stronger side and capped by the family limit.
    fn mean_shift(&self, gap: f64) -> f64 {
        let predicted = self.params.margin_intercept + self.params.margin_slope * gap.abs();
        let cap = self.params.adjustment_limit * self.params.base_mean;
        let shift = predicted.clamp(0., cap);
        if gap >= 0. { shift } else { -shift }
    }
}

impl ScoreModel for GaussianScore {
    fn simulate(&self, rating_a: f64, rating_b: f64, rng: &mut StdRng) -> (u32, u32) {
        let shift = self.mean_shift(rating_a - rating_b);
        let std = self.params.base_std.max(MIN_STD);
        let side_a = Normal::new(self.params.base_mean + 0.5 * shift, std)
            .expect("calibrated moments are finite");
        let side_b = Normal::new(self.params.base_mean - 0.5 * shift, std)
            .expect("calibrated moments are finite");
        let mut a = side_a.sample(rng).round().max(0.) as u32;
        let mut b = side_b.sample(rng).round().max(0.) as u32;

        let overtime_a = Normal::new(
            (self.params.base_mean + 0.5 * shift) * OVERTIME_FRACTION,
            (std * OVERTIME_FRACTION).max(MIN_STD),
        )
        .expect("calibrated moments are finite");
        let overtime_b = Normal::new(
            (self.params.base_mean - 0.5 * shift) * OVERTIME_FRACTION,
            (std * OVERTIME_FRACTION).max(MIN_STD),
        )
        .expect("calibrated moments are finite");
        while a == b {
            a += overtime_a.sample(rng).round().max(0.) as u32;
            b += overtime_b.sample(rng).round().max(0.) as u32;
        }
        (a, b)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::SportFamily;
    use crate::models::test_support::params;
    use crate::numerical::standard_normal_cdf;
    use rand::SeedableRng;

    fn model(base_mean: f64) -> GaussianScore {
        GaussianScore {
            params: params(SportFamily::HighScore, base_mean, 0.),
            e_factor: 250.,
        }
    }

    #[test]
    fn never_emits_a_tie() {
        let model = model(62.);
        let mut rng = StdRng::seed_from_u64(19);
        for _ in 0..5000 {
            let (a, b) = model.simulate(1500., 1500., &mut rng);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn win_rate_matches_the_normal_difference() {
        let model = model(62.);
        let mut rng = StdRng::seed_from_u64(23);
        let runs = 40_000;
        let wins = (0..runs)
            .filter(|_| {
                let (a, b) = model.simulate(1700., 1500., &mut rng);
                a > b
            })
            .count();
        let observed = wins as f64 / runs as f64;
        // Score difference is Normal(shift, std * sqrt(2)); overtime only
        // redistributes the near-tie mass, roughly evenly.
        let shift = (1.0_f64 + 0.02 * 200.).min(0.10 * 62.);
        let std = model.params.base_std.max(1.);
        let predicted = standard_normal_cdf(shift / (std * std::f64::consts::SQRT_2));
        assert!(
            (observed - predicted).abs() < 0.03,
            "observed {} vs predicted {}",
            observed,
            predicted
        );
    }

    #[test]
    fn margin_cap_respects_family_limit() {
        let model = model(62.);
        // A monster gap cannot shift the mean past 10% of base.
        assert!(model.mean_shift(5000.).abs() <= 0.10 * 62. + 1e-12);
        assert!(model.mean_shift(-5000.) < 0.);
    }
}
