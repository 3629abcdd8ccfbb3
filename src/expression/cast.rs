//! Value conversion for explicit `cast` expressions.
use super::{Kernel, Operation};
use crate::computation::ComputationError;
use crate::model::{ScalarType, Value};
use std::sync::Arc;

/// Converts a value to `to`. Null casts to null; a value whose literal form
/// does not parse as the target type is an error.
pub fn cast_value(value: &Value, to: ScalarType) -> Result<Value, ComputationError> {
    let fail = || ComputationError::Cast { value: value.to_string(), target: to };
    if value.is_null() || value.scalar_type() == Some(to) {
        return Ok(value.clone());
    }
    let cast = match (value, to) {
        (Value::Integer(i), ScalarType::Number) => Value::Number(*i as f64),
        (Value::Integer(i), ScalarType::Boolean) => Value::Boolean(*i != 0),
        (Value::Number(n), ScalarType::Integer) => {
            // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
            if n.fract() != 0.0 || !n.is_finite() || *n >= i64::MAX as f64 || *n < i64::MIN as f64 {
                return Err(fail());
            }
            Value::Integer(*n as i64)
        }
        (Value::Number(n), ScalarType::Boolean) => Value::Boolean(*n != 0.0),
        (Value::Boolean(b), ScalarType::Integer) => Value::Integer(i64::from(*b)),
        (Value::Boolean(b), ScalarType::Number) => Value::Number(if *b { 1.0 } else { 0.0 }),
        (Value::String(s), _) => Value::parse(s, to).ok_or_else(fail)?,
        (_, ScalarType::String) => Value::String(value.to_string()),
        _ => return Err(fail()),
    };
    Ok(cast)
}

/// The `cast` operation towards `to`.
pub fn cast_operation(to: ScalarType) -> Operation {
    let kernel: Kernel = Arc::new(move |args: &[Value]| cast_value(&args[0], to));
    Operation::new("cast", to, kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Integer(0), ScalarType::Boolean, Value::Boolean(false))]
    #[case(Value::Integer(-5), ScalarType::Boolean, Value::Boolean(true))]
    #[case(Value::Integer(42), ScalarType::String, Value::from("42"))]
    #[case(Value::from(" 17 "), ScalarType::Integer, Value::Integer(17))]
    #[case(Value::Number(3.0), ScalarType::Integer, Value::Integer(3))]
    #[case(Value::Number(-9223372036854775808.0), ScalarType::Integer, Value::Integer(i64::MIN))]
    #[case(Value::from("2020-01-31"), ScalarType::Date, Value::Date(chrono::NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()))]
    #[case(Value::Null, ScalarType::Integer, Value::Null)]
    fn test_cast_values(#[case] input: Value, #[case] to: ScalarType, #[case] expected: Value) {
        assert_eq!(cast_value(&input, to).unwrap(), expected);
    }

    #[rstest]
    #[case(Value::from("12a"), ScalarType::Integer)]
    #[case(Value::Number(2.5), ScalarType::Integer)]
    #[case(Value::Number(9223372036854775808.0), ScalarType::Integer)]
    #[case(Value::Number(-1.0e19), ScalarType::Integer)]
    #[case(Value::from("maybe"), ScalarType::Boolean)]
    fn test_cast_failures_are_errors(#[case] input: Value, #[case] to: ScalarType) {
        assert!(matches!(cast_value(&input, to), Err(ComputationError::Cast { .. })));
    }

    #[test]
    fn test_integer_string_round_trip() {
        for x in [i64::MIN, -1, 0, 7, i64::MAX] {
            let s = cast_value(&Value::Integer(x), ScalarType::String).unwrap();
            assert_eq!(cast_value(&s, ScalarType::Integer).unwrap(), Value::Integer(x));
        }
    }
}
