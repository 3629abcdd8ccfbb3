//! Aggregate kernels evaluated over an analytic frame.
use super::analytic::AnalyticFunction;
use super::error::ComputationError;
use crate::model::{ScalarType, Value};

/// Aggregates the measure values of a frame, given in frame order.
///
/// Nulls are ignored by every numeric aggregate. `COUNT` counts every row of
/// the frame; `FIRST_VALUE`/`LAST_VALUE` return the boundary value as-is.
pub fn aggregate(function: AnalyticFunction, frame: &[&Value], measure: ScalarType) -> Result<Value, ComputationError> {
    use AnalyticFunction::*;
    match function {
        Count => return Ok(Value::Integer(frame.len() as i64)),
        FirstValue => return Ok(frame.first().map_or(Value::Null, |v| (*v).clone())),
        LastValue => return Ok(frame.last().map_or(Value::Null, |v| (*v).clone())),
        Min | Max => {
            let present = frame.iter().filter(|v| !v.is_null());
            let chosen = if function == Min {
                present.min_by(|a, b| a.total_cmp(b))
            } else {
                present.max_by(|a, b| a.total_cmp(b))
            };
            return Ok(chosen.map_or(Value::Null, |v| (*v).clone()));
        }
        _ => {}
    }

    let values: Vec<f64> = frame.iter().filter_map(|v| v.as_f64()).collect();
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let n = values.len() as f64;
    let result = match function {
        Sum if measure == ScalarType::Integer => {
            let total = frame
                .iter()
                .filter_map(|v| v.as_i64())
                .try_fold(0i64, |acc, x| acc.checked_add(x))
                .ok_or_else(|| ComputationError::overflow("sum"))?;
            return Ok(Value::Integer(total));
        }
        Sum => values.iter().sum(),
        Avg => values.iter().sum::<f64>() / n,
        Median => median(values),
        VarPop | StddevPop | VarSamp | StddevSamp => {
            let sample = matches!(function, VarSamp | StddevSamp);
            if sample && values.len() < 2 {
                return Ok(Value::Null);
            }
            let variance = sum_of_squares(&values) / if sample { n - 1.0 } else { n };
            if matches!(function, StddevPop | StddevSamp) {
                variance.sqrt()
            } else {
                variance
            }
        }
        other => return Err(ComputationError::NotImplemented(other.name().to_string())),
    };
    Ok(Value::Number(result))
}

/// Two-pass sum of squared deviations from the mean.
fn sum_of_squares(values: &[f64]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|x| (x - mean) * (x - mean)).sum()
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use AnalyticFunction::*;

    fn run(function: AnalyticFunction, values: &[Value], ty: ScalarType) -> Value {
        let frame: Vec<&Value> = values.iter().collect();
        aggregate(function, &frame, ty).unwrap()
    }

    #[test]
    fn test_stddev_samp_single_row_is_null() {
        assert_eq!(run(StddevSamp, &[Value::Number(4.0)], ScalarType::Number), Value::Null);
        assert_eq!(run(StddevPop, &[Value::Number(4.0)], ScalarType::Number), Value::Number(0.0));
    }

    #[test]
    fn test_stddev_samp_two_rows() {
        let (a, b) = (3.0f64, 10.0f64);
        let result = run(StddevSamp, &[Value::Number(a), Value::Number(b)], ScalarType::Number);
        let expected = (a - b).abs() / 2f64.sqrt();
        assert!((result.as_f64().unwrap() - expected).abs() < 1e-12);
    }

    #[rstest]
    #[case(Sum, Value::Integer(6))]
    #[case(Count, Value::Integer(4))]
    #[case(Avg, Value::Number(2.0))]
    #[case(Median, Value::Number(2.0))]
    #[case(Min, Value::Integer(1))]
    #[case(Max, Value::Integer(3))]
    #[case(FirstValue, Value::Integer(1))]
    #[case(LastValue, Value::Null)]
    fn test_nulls_excluded_except_count(#[case] function: AnalyticFunction, #[case] expected: Value) {
        let values = [Value::Integer(1), Value::Integer(3), Value::Integer(2), Value::Null];
        assert_eq!(run(function, &values, ScalarType::Integer), expected);
    }

    #[test]
    fn test_all_null_frame() {
        assert_eq!(run(Sum, &[Value::Null, Value::Null], ScalarType::Integer), Value::Null);
        assert_eq!(run(Count, &[Value::Null, Value::Null], ScalarType::Integer), Value::Integer(2));
    }

    #[test]
    fn test_integer_sum_overflow() {
        let frame = [Value::Integer(i64::MAX), Value::Integer(1)];
        let refs: Vec<&Value> = frame.iter().collect();
        assert!(matches!(aggregate(Sum, &refs, ScalarType::Integer), Err(ComputationError::Overflow { .. })));
    }
}
