use crate::domain::{AggregationPolicy, ChiError, ChiResult};

/// Elementwise combination of signals that share one canonical grid.
///
/// Returns `Ok(None)` for an empty set so callers can tell "no data" apart
/// from a zero curve.
pub fn combine<S>(signals: &[S], policy: AggregationPolicy) -> ChiResult<Option<Vec<f64>>>
where
    S: AsRef<[f64]>,
{
    let Some(first) = signals.first() else {
        return Ok(None);
    };

    let mut accumulator = vec![0.0; first.as_ref().len()];
    for (index, signal) in signals.iter().enumerate() {
        let signal = signal.as_ref();
        if signal.len() != accumulator.len() {
            return Err(ChiError::internal(
                "RUN.COMBINE_SHAPE",
                format!(
                    "signal {index} has {} points, expected {}",
                    signal.len(),
                    accumulator.len()
                ),
            ));
        }
        for (total, value) in accumulator.iter_mut().zip(signal) {
            *total += value;
        }
    }

    if policy == AggregationPolicy::Average {
        let count = signals.len() as f64;
        for total in &mut accumulator {
            *total /= count;
        }
    }

    Ok(Some(accumulator))
}

pub fn sum<S: AsRef<[f64]>>(signals: &[S]) -> ChiResult<Option<Vec<f64>>> {
    combine(signals, AggregationPolicy::Sum)
}

pub fn average<S: AsRef<[f64]>>(signals: &[S]) -> ChiResult<Option<Vec<f64>>> {
    combine(signals, AggregationPolicy::Average)
}
