use crate::error::EngineError;

/// Behavioral scores reduced from one completed session. Derived once,
/// immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub mean_latency_ms: f64,
    pub latency_std_dev_ms: f64,
    pub accuracy_rate: f64,
    pub impulsivity_error_rate: f64,
    pub focus_consistency_score: f64,
    pub task_completion_ratio: f64,
}

fn mean(data: &[f64]) -> Option<f64> {
    let count = data.len();
    match count {
        positive if positive > 0 => Some(data.iter().sum::<f64>() / count as f64),
        _ => None,
    }
}

/// Population standard deviation (divisor N, not N-1). A single-element
/// sample has zero spread by definition.
fn population_std_dev(data: &[f64]) -> Option<f64> {
    match (mean(data), data.len()) {
        (Some(data_mean), count) if count > 0 => {
            let variance = data
                .iter()
                .map(|value| {
                    let diff = data_mean - *value;
                    diff * diff
                })
                .sum::<f64>()
                / count as f64;
            Some(variance.sqrt())
        }
        _ => None,
    }
}

/// Pure reduction of a completed sample into the score vector the remote
/// scorer expects. Fails fast when called before the sample is complete.
///
/// The impulsivity denominator inflates with the error count, and the focus
/// score's `+ 1` guards the all-identical-latencies case; both formulas are
/// fixed by the remote scorer's expected ranges.
pub fn reduce(
    latencies_ms: &[u64],
    premature_count: u32,
    total_trials: usize,
) -> Result<Metrics, EngineError> {
    if total_trials == 0 {
        return Err(EngineError::NoTrialsConfigured);
    }
    if latencies_ms.len() != total_trials {
        return Err(EngineError::IncompleteSample {
            expected: total_trials,
            actual: latencies_ms.len(),
        });
    }

    let sample: Vec<f64> = latencies_ms.iter().map(|ms| *ms as f64).collect();
    // len == total_trials >= 1, so both helpers yield Some
    let mean_latency_ms = mean(&sample).unwrap_or(0.0);
    let latency_std_dev_ms = population_std_dev(&sample).unwrap_or(0.0);

    let impulsivity_error_rate =
        premature_count as f64 / (total_trials as f64 + premature_count as f64);
    let focus_consistency_score = 1000.0 / (latency_std_dev_ms + 1.0);

    // Every in-window tap counts as correct and the session ran to
    // completion, so both ratios are pinned at 1.0.
    Ok(Metrics {
        mean_latency_ms,
        latency_std_dev_ms,
        accuracy_rate: 1.0,
        impulsivity_error_rate,
        focus_consistency_score,
        task_completion_ratio: 1.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const EPS: f64 = 1e-9;

    #[test]
    fn single_trial_sample_has_zero_spread() {
        let m = reduce(&[500], 0, 1).unwrap();
        assert_eq!(m.mean_latency_ms, 500.0);
        assert_eq!(m.latency_std_dev_ms, 0.0);
        assert_eq!(m.focus_consistency_score, 1000.0);
        assert_eq!(m.impulsivity_error_rate, 0.0);
        assert_eq!(m.accuracy_rate, 1.0);
        assert_eq!(m.task_completion_ratio, 1.0);
    }

    #[test]
    fn five_trial_worked_example() {
        let m = reduce(&[300, 400, 500, 400, 500], 1, 5).unwrap();
        assert!((m.mean_latency_ms - 420.0).abs() < EPS);
        // diffs -120, -20, 80, -20, 80 square-sum to 28000; divisor N gives 5600
        assert!((m.latency_std_dev_ms - 5600.0_f64.sqrt()).abs() < EPS);
        assert!((m.impulsivity_error_rate - 1.0 / 6.0).abs() < EPS);
        assert!((m.focus_consistency_score - 1000.0 / (5600.0_f64.sqrt() + 1.0)).abs() < EPS);
    }

    #[test]
    fn identical_latencies_pin_focus_score() {
        let m = reduce(&[350, 350, 350], 0, 3).unwrap();
        assert_eq!(m.latency_std_dev_ms, 0.0);
        assert_eq!(m.focus_consistency_score, 1000.0);
    }

    #[test]
    fn impulsivity_denominator_inflates_with_errors() {
        let none = reduce(&[400; 5], 0, 5).unwrap();
        let some = reduce(&[400; 5], 5, 5).unwrap();
        let many = reduce(&[400; 5], 15, 5).unwrap();
        assert_eq!(none.impulsivity_error_rate, 0.0);
        assert!((some.impulsivity_error_rate - 0.5).abs() < EPS);
        assert!((many.impulsivity_error_rate - 0.75).abs() < EPS);
    }

    #[test]
    fn incomplete_sample_is_rejected() {
        assert_matches!(
            reduce(&[300, 400], 0, 5),
            Err(EngineError::IncompleteSample {
                expected: 5,
                actual: 2
            })
        );
    }

    #[test]
    fn zero_trials_is_rejected() {
        assert_matches!(reduce(&[], 0, 0), Err(EngineError::NoTrialsConfigured));
    }

    #[test]
    fn reduction_is_deterministic() {
        let a = reduce(&[312, 287, 401, 356, 298], 2, 5).unwrap();
        let b = reduce(&[312, 287, 401, 356, 298], 2, 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn inputs_are_not_mutated() {
        let latencies = vec![300, 400, 500];
        let before = latencies.clone();
        let _ = reduce(&latencies, 1, 3).unwrap();
        assert_eq!(latencies, before);
    }
}
