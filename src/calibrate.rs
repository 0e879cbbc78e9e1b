//! Fits sport-specific scoring distributions to a historical corpus.
//!
//! Samples per sport/division are small (30-120 games), so every fit
//! carries an overfitting guard and a documented fallback. Nothing here
//! fails: bad data degrades to a simpler, more conservative model with a
//! quality warning on the log.

use crate::data_processing::MatchRecord;
use crate::models::SportFamily;
use crate::numerical::{linear_fit, logistic_fit, mean_and_variance, sigmoid};
use serde::{Deserialize, Serialize};

/// Ceiling applied to any predicted draw probability.
const MAX_DRAW_PROB: f64 = 0.95;
/// Newton iterations for the draw-model logistic fit.
const LOGISTIC_ITERS: usize = 25;
/// Winner set-share clamp for set-based sports.
const SET_SHARE_RANGE: (f64, f64) = (0.5, 0.95);

/// Sufficiency and sanity thresholds for the calibration fits. These are
/// empirically chosen and may need re-tuning per dataset; they are carried
/// as configuration rather than hardcoded at the call sites.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationLimits {
    pub min_draws: usize,
    pub min_draw_frac: f64,
    pub max_intercept: f64,
    pub max_linear: f64,
    pub min_margin_samples: usize,
    pub dispersion_floor: f64,
    // stands in for an infinite shape when there is no overdispersion
    pub pure_count_shape: f64,
}

impl Default for CalibrationLimits {
    fn default() -> Self {
        Self {
            min_draws: 5,
            min_draw_frac: 0.04,
            max_intercept: 100.,
            max_linear: 10.,
            min_margin_samples: 10,
            dispersion_floor: 3.0,
            pure_count_shape: 1000.,
        }
    }
}

/// Draw probability as a function of the strength gap. Either fully fitted
/// or fully empirical; the enum rules out half-populated coefficients.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawModel {
    Fitted {
        intercept: f64,
        linear: f64,
        quadratic: f64,
        /// Rescales predictions so their mean matches the empirical rate.
        multiplier: f64,
    },
    Empirical {
        rate: f64,
    },
}

impl DrawModel {
    pub fn draw_probability(&self, gap: f64) -> f64 {
        match *self {
            DrawModel::Fitted {
                intercept,
                linear,
                quadratic,
                multiplier,
            } => {
                let gap = gap.abs();
                let raw = sigmoid(intercept + linear * gap + quadratic * gap * gap);
                (raw * multiplier).clamp(0., MAX_DRAW_PROB)
            }
            DrawModel::Empirical { rate } => rate.clamp(0., MAX_DRAW_PROB),
        }
    }
}

/// Calibrated scoring parameters for one sport x division, consumed
/// unchanged by every simulation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibratedParams {
    /// Mean per-team score; for set-based sports, the winner's share of
    /// sets played instead.
    pub base_mean: f64,
    pub base_std: f64,
    /// Gamma-Poisson mixing shape; always >= the calibration floor.
    pub dispersion: f64,
    pub draw_model: DrawModel,
    pub margin_slope: f64,
    pub margin_intercept: f64,
    /// Family bound on how far a strength edge shifts the simulated mean.
    pub adjustment_limit: f64,
    pub sample_matches: usize,
}

/// Method-of-moments Gamma-Poisson shape. Underdispersed samples behave
/// like a pure count process and get the high fixed shape.
pub fn fit_dispersion(scores: &[f64], limits: &CalibrationLimits) -> f64 {
    if scores.len() < 2 {
        return limits.pure_count_shape;
    }
    let (mean, var) = mean_and_variance(scores);
    if var <= mean {
        return limits.pure_count_shape;
    }
    (mean * mean / (var - mean)).max(limits.dispersion_floor)
}

/// Logistic draw model with sufficiency and sanity guards. The fallback is
/// the constant empirical rate; both rejection paths land there.
pub fn fit_draw_model(gaps: &[f64], draws: &[bool], limits: &CalibrationLimits) -> DrawModel {
    assert_eq!(gaps.len(), draws.len());
    let n = draws.len();
    let n_draws = draws.iter().filter(|&&d| d).count();
    let empirical = if n == 0 { 0. } else { n_draws as f64 / n as f64 };
    let threshold = limits
        .min_draws
        .max((limits.min_draw_frac * n as f64).ceil() as usize);
    if n_draws < threshold {
        tracing::warn!(
            "Only {} draws in {} matches; falling back to the constant rate {:.3}",
            n_draws,
            n,
            empirical
        );
        return DrawModel::Empirical { rate: empirical };
    }

    let features: Vec<[f64; 3]> = gaps
        .iter()
        .map(|gap| {
            let gap = gap.abs();
            [1., gap, gap * gap]
        })
        .collect();
    match logistic_fit(&features, draws, LOGISTIC_ITERS) {
        Some(coefs) if accept_draw_fit(coefs, limits) => {
            let [intercept, linear, quadratic] = coefs;
            let multiplier = fit_draw_multiplier(&features, coefs, empirical);
            DrawModel::Fitted {
                intercept,
                linear,
                quadratic,
                multiplier,
            }
        }
        Some(coefs) => {
            tracing::warn!(
                "Rejecting numerically unstable draw fit {:?}; falling back to rate {:.3}",
                coefs,
                empirical
            );
            DrawModel::Empirical { rate: empirical }
        }
        None => {
            tracing::warn!("Draw fit did not converge; falling back to rate {:.3}", empirical);
            DrawModel::Empirical { rate: empirical }
        }
    }
}

// Sanity guard on fitted coefficients; absurd magnitudes indicate a
// separable or near-degenerate corpus.
fn accept_draw_fit(coefs: [f64; 3], limits: &CalibrationLimits) -> bool {
    coefs[0].abs() <= limits.max_intercept && coefs[1].abs() <= limits.max_linear
}

// Grid search on [0.50, 1.50]: the multiplier whose rescaled mean
// prediction lands closest to the empirical draw rate.
fn fit_draw_multiplier(features: &[[f64; 3]], coefs: [f64; 3], empirical: f64) -> f64 {
    let preds: Vec<f64> = features
        .iter()
        .map(|x| sigmoid(coefs[0] * x[0] + coefs[1] * x[1] + coefs[2] * x[2]))
        .collect();
    let mut best = (f64::INFINITY, 1.0);
    for step in 50..=150 {
        let mult = step as f64 / 100.;
        let mean = preds.iter().map(|p| (p * mult).min(1.)).sum::<f64>() / preds.len() as f64;
        let err = (mean - empirical).abs();
        if err < best.0 {
            best = (err, mult);
        }
    }
    best.1
}

/// Victory margin vs absolute strength gap, by ordinary least squares.
/// Too few non-draw matches yield a flat fit at the observed mean margin.
pub fn fit_margin(gaps: &[f64], margins: &[f64], limits: &CalibrationLimits) -> (f64, f64) {
    assert_eq!(gaps.len(), margins.len());
    if margins.len() < limits.min_margin_samples {
        tracing::warn!(
            "Only {} decided matches; margin model degrades to a constant",
            margins.len()
        );
        let intercept = if margins.is_empty() {
            1.
        } else {
            margins.iter().sum::<f64>() / margins.len() as f64
        };
        return (0., intercept);
    }
    linear_fit(gaps, margins)
}

/// Runs the three fits over one division's corpus. `gaps` must align with
/// `records` (one strength-before-match value per record, from
/// `replay_history`). Absence-flagged matches are dropped here. Idempotent;
/// mutates nothing.
pub fn calibrate(
    records: &[MatchRecord],
    gaps: &[f64],
    family: SportFamily,
    limits: &CalibrationLimits,
) -> CalibratedParams {
    assert_eq!(records.len(), gaps.len());
    let sample: Vec<(&MatchRecord, f64)> = records
        .iter()
        .zip(gaps.iter().copied())
        .filter(|(rec, _)| !rec.absence)
        .collect();

    let mut scores = Vec::with_capacity(2 * sample.len());
    let mut draw_gaps = Vec::with_capacity(sample.len());
    let mut draws = Vec::with_capacity(sample.len());
    let mut margin_gaps = vec![];
    let mut margins = vec![];
    let mut winner_sets = 0u64;
    let mut total_sets = 0u64;
    for &(rec, gap) in &sample {
        scores.push(rec.score_a as f64);
        scores.push(rec.score_b as f64);
        draw_gaps.push(gap);
        draws.push(rec.is_draw());
        if !rec.is_draw() {
            margin_gaps.push(gap.abs());
            margins.push(rec.margin() as f64);
        }
        winner_sets += rec.score_a.max(rec.score_b) as u64;
        total_sets += (rec.score_a + rec.score_b) as u64;
    }

    let (score_mean, score_var) = mean_and_variance(&scores);
    let base_mean = match family {
        SportFamily::SetBased => {
            let share = if total_sets == 0 {
                SET_SHARE_RANGE.0
            } else {
                winner_sets as f64 / total_sets as f64
            };
            share.clamp(SET_SHARE_RANGE.0, SET_SHARE_RANGE.1)
        }
        _ => score_mean,
    };
    let draw_model = match family {
        // Structurally impossible; keeps the simulator honest anyway.
        SportFamily::SetBased => DrawModel::Empirical { rate: 0. },
        _ => fit_draw_model(&draw_gaps, &draws, limits),
    };
    let (margin_slope, margin_intercept) = fit_margin(&margin_gaps, &margins, limits);

    CalibratedParams {
        base_mean,
        base_std: score_var.sqrt(),
        dispersion: fit_dispersion(&scores, limits),
        draw_model,
        margin_slope,
        margin_intercept,
        adjustment_limit: family.adjustment_limit(),
        sample_matches: sample.len(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data_processing::Phase;

    fn record(score_a: u32, score_b: u32) -> MatchRecord {
        MatchRecord {
            team_a: "A".into(),
            team_b: "B".into(),
            score_a,
            score_b,
            match_index: 1,
            phase: Phase::Regular,
            absence: false,
            season_id: "s".into(),
            date: None,
        }
    }

    #[test]
    fn dispersion_floors_at_three() {
        let limits = CalibrationLimits::default();
        // Heavily overdispersed: raw k = mu^2/(var-mu) comes out near 0.5.
        let scores = [0., 0., 0., 0., 10., 10.];
        let (mean, var) = mean_and_variance(&scores);
        assert!(var > mean);
        let k = fit_dispersion(&scores, &limits);
        assert!(k >= limits.dispersion_floor);
        assert_eq!(k, limits.dispersion_floor);
    }

    #[test]
    fn underdispersed_scores_get_pure_count_shape() {
        let limits = CalibrationLimits::default();
        // Constant scores: variance 0 <= mean.
        let k = fit_dispersion(&[3., 3., 3., 3.], &limits);
        assert_eq!(k, limits.pure_count_shape);
        assert!(k >= limits.dispersion_floor);
    }

    #[test]
    fn moments_recovered_when_well_behaved() {
        let limits = CalibrationLimits::default();
        // mean 4, variance 52/9: overdispersed, so the raw moments formula applies
        let scores = [0., 3., 3., 4., 4., 4., 5., 9., 2., 6.];
        let (mean, var) = mean_and_variance(&scores);
        assert!(var > mean);
        let k = fit_dispersion(&scores, &limits);
        assert!((k - mean * mean / (var - mean)).abs() < 1e-9);
        assert!(k >= limits.dispersion_floor);
    }

    #[test]
    fn sparse_draws_force_fallback() {
        let limits = CalibrationLimits::default();
        let gaps: Vec<f64> = (0..40).map(|i| i as f64 * 10. - 200.).collect();
        let mut draws = vec![false; 40];
        draws[3] = true;
        draws[17] = true;
        let model = fit_draw_model(&gaps, &draws, &limits);
        match model {
            DrawModel::Empirical { rate } => assert!((rate - 2. / 40.).abs() < 1e-12),
            DrawModel::Fitted { .. } => panic!("expected the fallback model"),
        }
    }

    #[test]
    fn plentiful_draws_get_a_fitted_model() {
        let limits = CalibrationLimits::default();
        // Draws concentrate among evenly matched pairs, a clean logistic signal.
        let mut gaps = vec![];
        let mut draws = vec![];
        for i in 0..200 {
            let gap = (i % 40) as f64 * 10.;
            gaps.push(gap);
            draws.push(gap < 100. && i % 3 == 0);
        }
        let model = fit_draw_model(&gaps, &draws, &limits);
        let (near, far) = match model {
            DrawModel::Fitted { .. } => (
                model.draw_probability(0.),
                model.draw_probability(350.),
            ),
            DrawModel::Empirical { .. } => panic!("expected a fitted model"),
        };
        assert!(near > far, "draws should fade with the gap: {} vs {}", near, far);
    }

    #[test]
    fn unstable_coefficients_are_rejected() {
        let limits = CalibrationLimits::default();
        assert!(accept_draw_fit([-2.1, 0.4, -0.001], &limits));
        assert!(!accept_draw_fit([101., 0.4, 0.], &limits));
        assert!(!accept_draw_fit([-3., -11., 0.], &limits));
        // The quadratic term carries no guard of its own.
        assert!(accept_draw_fit([3., 2., 500.], &limits));
    }

    #[test]
    fn draw_probability_is_always_bounded() {
        let fitted = DrawModel::Fitted {
            intercept: 50.,
            linear: 0.,
            quadratic: 0.,
            multiplier: 1.5,
        };
        assert!(fitted.draw_probability(0.) <= 0.95);
        let empirical = DrawModel::Empirical { rate: 2.0 };
        assert!(empirical.draw_probability(123.) <= 0.95);
    }

    #[test]
    fn margin_fit_needs_enough_matches() {
        let limits = CalibrationLimits::default();
        let (slope, intercept) = fit_margin(&[10., 20.], &[1., 3.], &limits);
        assert_eq!(slope, 0.);
        assert!((intercept - 2.).abs() < 1e-12);

        let gaps: Vec<f64> = (0..30).map(|i| i as f64 * 10.).collect();
        let margins: Vec<f64> = gaps.iter().map(|g| 1. + 0.02 * g).collect();
        let (slope, intercept) = fit_margin(&gaps, &margins, &limits);
        assert!((slope - 0.02).abs() < 1e-9);
        assert!((intercept - 1.).abs() < 1e-9);
    }

    #[test]
    fn absences_are_excluded_from_calibration() {
        let limits = CalibrationLimits::default();
        let mut records = vec![record(2, 1), record(1, 1), record(0, 3)];
        let mut walkover = record(10, 0);
        walkover.absence = true;
        records.push(walkover);
        let gaps = vec![0.; records.len()];
        let params = calibrate(&records, &gaps, SportFamily::LowScore, &limits);
        assert_eq!(params.sample_matches, 3);
        // The 10-0 walkover must not leak into the scoring moments.
        assert!(params.base_mean < 2.);
    }

    #[test]
    fn set_based_calibration_reports_winner_share() {
        let limits = CalibrationLimits::default();
        // Two sweeps and one 2-1: winners took 6 of 7 sets.
        let records = vec![record(2, 0), record(0, 2), record(2, 1)];
        let gaps = vec![0.; 3];
        let params = calibrate(&records, &gaps, SportFamily::SetBased, &limits);
        assert!((params.base_mean - 6. / 7.).abs() < 1e-9);
        match params.draw_model {
            DrawModel::Empirical { rate } => assert_eq!(rate, 0.),
            DrawModel::Fitted { .. } => panic!("set sports cannot draw"),
        }
    }

    #[test]
    fn calibration_is_idempotent() {
        let limits = CalibrationLimits::default();
        let records: Vec<MatchRecord> = (0..30)
            .map(|i| record(i % 4, (i + 1) % 3))
            .collect();
        let gaps: Vec<f64> = (0..30).map(|i| (i as f64 - 15.) * 8.).collect();
        let first = calibrate(&records, &gaps, SportFamily::LowScore, &limits);
        let second = calibrate(&records, &gaps, SportFamily::LowScore, &limits);
        assert_eq!(first.base_mean, second.base_mean);
        assert_eq!(first.dispersion, second.dispersion);
        assert_eq!(first.margin_slope, second.margin_slope);
    }
}
