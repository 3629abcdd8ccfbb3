//! Rule for numeric widening and operand unification.
//!
//! `integer` widens to `number` only when the two operands of one binary
//! operator disagree. Every other pair of distinct types is an error. The
//! untyped null literal (`None`) unifies with anything.
use crate::model::ScalarType;
use crate::type_system::error::TypeRuleError;

/// The type both operands are evaluated at.
pub fn common_type(
    operator: &str,
    left: Option<ScalarType>,
    right: Option<ScalarType>,
) -> Result<Option<ScalarType>, TypeRuleError> {
    match (left, right) {
        (None, other) | (other, None) => Ok(other),
        (Some(a), Some(b)) if a == b => Ok(Some(a)),
        (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => Ok(Some(ScalarType::Number)),
        _ => Err(TypeRuleError::operands(operator, &[left, right])),
    }
}

/// Result type of `+ - *` and `mod`.
pub fn numeric_result(
    operator: &str,
    left: Option<ScalarType>,
    right: Option<ScalarType>,
) -> Result<ScalarType, TypeRuleError> {
    let numeric = |t: Option<ScalarType>| t.map_or(true, |t| t.is_numeric());
    if !numeric(left) || !numeric(right) {
        return Err(TypeRuleError::operands(operator, &[left, right]));
    }
    Ok(common_type(operator, left, right)?.unwrap_or(ScalarType::Integer))
}

/// Result type of `/`, which is always a number.
pub fn division_result(left: Option<ScalarType>, right: Option<ScalarType>) -> Result<ScalarType, TypeRuleError> {
    numeric_result("/", left, right).map(|_| ScalarType::Number)
}

/// The common type of a list of operands, such as the branches of a conditional.
pub fn unify_all(operator: &str, types: &[Option<ScalarType>]) -> Result<Option<ScalarType>, TypeRuleError> {
    types.iter().try_fold(None, |acc, &t| {
        common_type(operator, acc, t).map_err(|_| TypeRuleError::operands(operator, types))
    })
}
