use crate::common::constants::MIN_SPLINE_POINTS;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    #[error("cubic spline requires at least {required} points, got {actual}")]
    InsufficientPoints { actual: usize, required: usize },
    #[error("spline input length mismatch: knots={knots}, values={values}")]
    LengthMismatch { knots: usize, values: usize },
    #[error("spline knot must be finite at index {index}, got {value}")]
    NonFiniteKnot { index: usize, value: f64 },
    #[error("spline knots must be strictly increasing, index {index} has {current} after {previous}")]
    NonIncreasingKnot {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("spline value must be finite at index {index}, got {value}")]
    NonFiniteValue { index: usize, value: f64 },
}

/// Interpolating C2 cubic spline with not-a-knot end conditions: the third
/// derivative is continuous across the second and second-to-last knots.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    second_derivatives: Vec<f64>,
}

impl CubicSpline {
    pub fn not_a_knot(knots: &[f64], values: &[f64]) -> Result<Self, SplineError> {
        validate_knots_and_values(knots, values)?;

        let n = knots.len();
        let h: Vec<f64> = knots.windows(2).map(|pair| pair[1] - pair[0]).collect();
        let slopes: Vec<f64> = values
            .windows(2)
            .zip(&h)
            .map(|(pair, step)| (pair[1] - pair[0]) / step)
            .collect();

        // Unknowns are the interior second derivatives M[1..n-1]; the end values
        // are eliminated through the not-a-knot conditions.
        let m = n - 2;
        let mut lower = vec![0.0; m];
        let mut diag = vec![0.0; m];
        let mut upper = vec![0.0; m];
        let mut rhs = vec![0.0; m];
        for row in 0..m {
            let node = row + 1;
            lower[row] = h[node - 1];
            diag[row] = 2.0 * (h[node - 1] + h[node]);
            upper[row] = h[node];
            rhs[row] = 6.0 * (slopes[node] - slopes[node - 1]);
        }

        let (h0, h1) = (h[0], h[1]);
        diag[0] = (h0 + h1) * (h0 + 2.0 * h1) / h1;
        upper[0] = (h1 * h1 - h0 * h0) / h1;

        let (a, b) = (h[n - 3], h[n - 2]);
        lower[m - 1] = (a * a - b * b) / a;
        diag[m - 1] = (a + b) * (2.0 * a + b) / a;

        let interior = solve_tridiagonal(&lower, &diag, &upper, &rhs);

        let mut second_derivatives = Vec::with_capacity(n);
        second_derivatives.push(((h0 + h1) * interior[0] - h0 * interior[1]) / h1);
        second_derivatives.extend_from_slice(&interior);
        second_derivatives.push(((a + b) * interior[m - 1] - b * interior[m - 2]) / a);

        Ok(Self {
            knots: knots.to_vec(),
            values: values.to_vec(),
            second_derivatives,
        })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    pub fn contains(&self, x: f64) -> bool {
        let (lower, upper) = self.domain();
        x >= lower && x <= upper
    }

    /// Spline value at `x`, `None` outside the knot domain (no extrapolation).
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        if !self.contains(x) {
            return None;
        }

        let last_interval = self.knots.len() - 2;
        let interval = self
            .knots
            .partition_point(|knot| *knot <= x)
            .saturating_sub(1)
            .min(last_interval);

        let x0 = self.knots[interval];
        let x1 = self.knots[interval + 1];
        let y0 = self.values[interval];
        let y1 = self.values[interval + 1];
        let m0 = self.second_derivatives[interval];
        let m1 = self.second_derivatives[interval + 1];
        let step = x1 - x0;
        let left = x1 - x;
        let right = x - x0;

        Some(
            (m0 * left * left * left + m1 * right * right * right) / (6.0 * step)
                + (y0 / step - m0 * step / 6.0) * left
                + (y1 / step - m1 * step / 6.0) * right,
        )
    }

    pub fn evaluate_or(&self, x: f64, fill_value: f64) -> f64 {
        self.evaluate(x).unwrap_or(fill_value)
    }
}

/// Thomas algorithm; the not-a-knot system is strictly diagonally dominant so
/// no pivoting is needed.
fn solve_tridiagonal(lower: &[f64], diag: &[f64], upper: &[f64], rhs: &[f64]) -> Vec<f64> {
    let size = diag.len();
    let mut c_prime = vec![0.0; size];
    let mut d_prime = vec![0.0; size];

    c_prime[0] = upper[0] / diag[0];
    d_prime[0] = rhs[0] / diag[0];
    for row in 1..size {
        let denominator = diag[row] - lower[row] * c_prime[row - 1];
        c_prime[row] = upper[row] / denominator;
        d_prime[row] = (rhs[row] - lower[row] * d_prime[row - 1]) / denominator;
    }

    let mut solution = vec![0.0; size];
    solution[size - 1] = d_prime[size - 1];
    for row in (0..size - 1).rev() {
        solution[row] = d_prime[row] - c_prime[row] * solution[row + 1];
    }
    solution
}

fn validate_knots_and_values(knots: &[f64], values: &[f64]) -> Result<(), SplineError> {
    if knots.len() != values.len() {
        return Err(SplineError::LengthMismatch {
            knots: knots.len(),
            values: values.len(),
        });
    }
    if knots.len() < MIN_SPLINE_POINTS {
        return Err(SplineError::InsufficientPoints {
            actual: knots.len(),
            required: MIN_SPLINE_POINTS,
        });
    }

    for (index, value) in knots.iter().copied().enumerate() {
        if !value.is_finite() {
            return Err(SplineError::NonFiniteKnot { index, value });
        }

        if index > 0 {
            let previous = knots[index - 1];
            if value <= previous {
                return Err(SplineError::NonIncreasingKnot {
                    index,
                    previous,
                    current: value,
                });
            }
        }
    }

    for (index, value) in values.iter().copied().enumerate() {
        if !value.is_finite() {
            return Err(SplineError::NonFiniteValue { index, value });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CubicSpline, SplineError};

    fn cubic(x: f64) -> f64 {
        0.5 * x * x * x - 2.0 * x * x + x - 3.0
    }

    #[test]
    fn spline_is_exact_at_knots() {
        let knots = [0.0, 0.3, 1.1, 1.7, 2.0, 3.4];
        let values = [0.2, -1.0, 0.7, 0.1, 2.5, -0.4];
        let spline = CubicSpline::not_a_knot(&knots, &values).expect("spline");

        for (knot, value) in knots.iter().zip(values) {
            let evaluated = spline.evaluate(*knot).expect("inside domain");
            assert!((evaluated - value).abs() < 1.0e-12, "{knot}: {evaluated}");
        }
    }

    #[test]
    fn not_a_knot_reproduces_cubic_polynomials() {
        let knots = [-1.0, -0.2, 0.5, 0.9, 2.0, 2.25, 3.5];
        let values: Vec<f64> = knots.iter().copied().map(cubic).collect();
        let spline = CubicSpline::not_a_knot(&knots, &values).expect("spline");

        for step in 0..=90 {
            let x = -1.0 + 4.5 * step as f64 / 90.0;
            let evaluated = spline.evaluate(x).expect("inside domain");
            assert!((evaluated - cubic(x)).abs() < 1.0e-9, "{x}: {evaluated}");
        }
    }

    #[test]
    fn four_points_define_a_single_cubic() {
        let knots = [0.0, 1.0, 2.5, 3.0];
        let values: Vec<f64> = knots.iter().copied().map(cubic).collect();
        let spline = CubicSpline::not_a_knot(&knots, &values).expect("spline");
        assert!((spline.evaluate(1.75).expect("inside") - cubic(1.75)).abs() < 1.0e-10);
    }

    #[test]
    fn evaluation_outside_domain_is_absent() {
        let spline =
            CubicSpline::not_a_knot(&[1.0, 2.0, 3.0, 4.0], &[1.0, 4.0, 9.0, 16.0]).expect("spline");
        assert_eq!(spline.domain(), (1.0, 4.0));
        assert_eq!(spline.evaluate(0.999), None);
        assert_eq!(spline.evaluate(4.001), None);
        assert_eq!(spline.evaluate_or(5.0, 0.0), 0.0);
        assert!((spline.evaluate(4.0).expect("endpoint") - 16.0).abs() < 1.0e-12);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert_eq!(
            CubicSpline::not_a_knot(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]),
            Err(SplineError::InsufficientPoints {
                actual: 3,
                required: 4
            })
        );
        assert_eq!(
            CubicSpline::not_a_knot(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0]),
            Err(SplineError::LengthMismatch {
                knots: 4,
                values: 2
            })
        );
        assert_eq!(
            CubicSpline::not_a_knot(&[0.0, 1.0, 1.0, 3.0], &[0.0; 4]),
            Err(SplineError::NonIncreasingKnot {
                index: 2,
                previous: 1.0,
                current: 1.0
            })
        );
        assert!(matches!(
            CubicSpline::not_a_knot(&[0.0, 1.0, 2.0, 3.0], &[0.0, f64::NAN, 0.0, 0.0]),
            Err(SplineError::NonFiniteValue { index: 1, .. })
        ));
    }
}
