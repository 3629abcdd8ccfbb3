//! Argument checks shared by operator and function dispatch.
use super::error::{describe, TypeRuleError};
use crate::model::ScalarType;

/// Checks that an operand has type `expected`. The null literal always passes.
pub fn expect(operator: &str, found: Option<ScalarType>, expected: ScalarType) -> Result<(), TypeRuleError> {
    match found {
        None => Ok(()),
        Some(t) if t == expected => Ok(()),
        Some(_) => Err(TypeRuleError::Mismatch {
            expected: format!("{} operand of {}", expected, operator),
            found: describe(found),
        }),
    }
}

pub fn expect_numeric(operator: &str, found: Option<ScalarType>) -> Result<(), TypeRuleError> {
    match found {
        Some(t) if !t.is_numeric() => Err(TypeRuleError::Mismatch {
            expected: format!("numeric operand of {}", operator),
            found: t.to_string(),
        }),
        _ => Ok(()),
    }
}

/// The type of a numeric operand, defaulting the null literal to `integer`.
pub fn numeric_or_integer(found: Option<ScalarType>) -> ScalarType {
    found.unwrap_or(ScalarType::Integer)
}

/// Checks an exact argument count.
pub fn expect_arity(operator: &str, found: usize, min: usize, max: usize) -> Result<(), TypeRuleError> {
    if (min..=max).contains(&found) {
        return Ok(());
    }
    let expected = if min == max { format!("{} arguments to {}", min, operator) } else { format!("{} to {} arguments to {}", min, max, operator) };
    Err(TypeRuleError::Mismatch { expected, found: found.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(ScalarType::String), ScalarType::String, true)]
    #[case(None, ScalarType::Boolean, true)]
    #[case(Some(ScalarType::Integer), ScalarType::Number, false)]
    #[case(Some(ScalarType::Number), ScalarType::Integer, false)]
    #[case(Some(ScalarType::Date), ScalarType::String, false)]
    fn test_expect(#[case] found: Option<ScalarType>, #[case] expected: ScalarType, #[case] ok: bool) {
        assert_eq!(expect("f", found, expected).is_ok(), ok);
    }

    #[test]
    fn test_arity_message() {
        let err = expect_arity("substr", 4, 1, 3).unwrap_err();
        assert_eq!(err.to_string(), "Expected 1 to 3 arguments to substr, found 4");
    }
}
