use crate::common::InsufficientDataPolicy;
use crate::domain::{ChiError, ChiResult, PathId, RawSignal};
use crate::numerics::{CanonicalGrid, CubicSpline, SplineError};

/// Out-of-range grid points carry no signal.
pub const OUT_OF_RANGE_FILL: f64 = 0.0;

/// Resamples one signal onto the canonical grid with a not-a-knot cubic
/// spline. Grid points outside the signal's native k range are zero.
pub fn resample(signal: &RawSignal, grid: &CanonicalGrid) -> Result<Vec<f64>, SplineError> {
    let spline = CubicSpline::not_a_knot(&signal.k_grid, &signal.chi_values)?;
    Ok(grid
        .points()
        .iter()
        .map(|k| spline.evaluate_or(*k, OUT_OF_RANGE_FILL))
        .collect())
}

pub fn signal_error(id: PathId, error: &SplineError) -> ChiError {
    let placeholder = match error {
        SplineError::InsufficientPoints { .. } => "DATA.SPLINE_POINTS",
        SplineError::LengthMismatch { .. } => "DATA.SIGNAL_SHAPE",
        SplineError::NonFiniteKnot { .. } | SplineError::NonIncreasingKnot { .. } => {
            "DATA.SIGNAL_GRID"
        }
        SplineError::NonFiniteValue { .. } => "DATA.SIGNAL_VALUES",
    };
    ChiError::insufficient_data(placeholder, format!("path {id}: {error}"))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResampledSet {
    pub curves: Vec<Vec<f64>>,
    pub skipped: Vec<PathId>,
}

/// Resamples every signal, applying `policy` to signals that cannot be
/// interpolated.
pub fn resample_all<'a, I>(
    signals: I,
    grid: &CanonicalGrid,
    policy: InsufficientDataPolicy,
) -> ChiResult<ResampledSet>
where
    I: IntoIterator<Item = &'a RawSignal>,
{
    let mut resampled = ResampledSet::default();
    for signal in signals {
        match resample(signal, grid) {
            Ok(curve) => resampled.curves.push(curve),
            Err(error) => match policy {
                InsufficientDataPolicy::Fail => return Err(signal_error(signal.id, &error)),
                InsufficientDataPolicy::Skip => {
                    tracing::warn!(
                        path_id = %signal.id,
                        %error,
                        "skipping signal that cannot be resampled"
                    );
                    resampled.skipped.push(signal.id);
                }
            },
        }
    }
    Ok(resampled)
}

#[cfg(test)]
mod tests {
    use super::{resample, resample_all};
    use crate::common::{GridSpec, InsufficientDataPolicy};
    use crate::domain::{ChiErrorCategory, PathId, RawSignal};
    use crate::numerics::{CanonicalGrid, SplineError};

    fn grid(k_min: f64, k_max: f64, k_step: f64) -> CanonicalGrid {
        CanonicalGrid::from_spec(GridSpec::new(k_min, k_max, k_step)).expect("grid")
    }

    #[test]
    fn coincident_grid_points_reproduce_original_values() {
        let signal = RawSignal::new(
            1,
            vec![2.0, 2.5, 3.0, 3.5, 4.0, 4.5],
            vec![0.1, -0.4, 0.25, 0.8, -0.3, 0.05],
        );
        let values = resample(&signal, &grid(2.0, 4.5, 0.5)).expect("resample");
        for (value, expected) in values.iter().zip(&signal.chi_values) {
            assert!((value - expected).abs() < 1.0e-12);
        }
    }

    #[test]
    fn points_outside_native_range_are_exactly_zero() {
        let signal = RawSignal::new(1, vec![1.0, 1.5, 2.0, 2.5], vec![3.0, 3.0, 3.0, 3.0]);
        let values = resample(&signal, &grid(0.0, 3.0, 0.5)).expect("resample");
        assert_eq!(values[0], 0.0);
        assert_eq!(values[1], 0.0);
        assert_eq!(values[6], 0.0);
        for value in &values[2..=5] {
            assert!((value - 3.0).abs() < 1.0e-12);
        }
    }

    #[test]
    fn short_signal_is_an_insufficient_data_error() {
        let signal = RawSignal::new(9, vec![0.0, 1.0, 2.0], vec![1.0, 1.0, 1.0]);
        let error = resample(&signal, &grid(0.0, 1.0, 0.5)).expect_err("too short");
        assert!(matches!(error, SplineError::InsufficientPoints { actual: 3, .. }));

        let error = resample_all([&signal], &grid(0.0, 1.0, 0.5), InsufficientDataPolicy::Fail)
            .expect_err("fail policy should propagate");
        assert_eq!(error.category(), ChiErrorCategory::InsufficientDataError);
        assert_eq!(error.placeholder(), "DATA.SPLINE_POINTS");
        assert!(error.message().starts_with("path 9:"));
    }

    #[test]
    fn skip_policy_records_dropped_signals() {
        let good = RawSignal::new(1, vec![0.0, 0.5, 1.0, 1.5], vec![1.0, 1.0, 1.0, 1.0]);
        let short = RawSignal::new(2, vec![0.0, 1.0], vec![1.0, 1.0]);
        let resampled = resample_all(
            [&good, &short],
            &grid(0.0, 1.0, 0.5),
            InsufficientDataPolicy::Skip,
        )
        .expect("skip policy should not fail");
        assert_eq!(resampled.curves.len(), 1);
        assert_eq!(resampled.skipped, vec![PathId(2)]);
    }
}
