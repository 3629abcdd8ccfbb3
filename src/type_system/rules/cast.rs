//! Rule for explicit casts between scalar types.
use crate::model::ScalarType;
use crate::type_system::error::TypeRuleError;

/// Whether `cast(x, to)` is legal for an operand of type `from`.
///
/// Strings cast to every type (failing at run time on unparsable values).
/// Temporal types only cast to string.
pub fn check_cast(from: Option<ScalarType>, to: ScalarType) -> Result<(), TypeRuleError> {
    use ScalarType::*;
    let Some(from) = from else { return Ok(()) };
    let allowed = from == to
        || match (from, to) {
            (String, _) => true,
            (Integer | Number | Boolean, Integer | Number | Boolean | String) => true,
            (Date | Duration, String) => true,
            _ => false,
        };
    if allowed {
        Ok(())
    } else {
        Err(TypeRuleError::InvalidCast { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ScalarType::*;

    #[rstest]
    #[case(Integer, String, true)]
    #[case(String, Integer, true)]
    #[case(Integer, Boolean, true)]
    #[case(Number, Integer, true)]
    #[case(Date, String, true)]
    #[case(Date, Integer, false)]
    #[case(Boolean, Date, false)]
    #[case(Duration, Number, false)]
    fn test_cast_table(#[case] from: ScalarType, #[case] to: ScalarType, #[case] allowed: bool) {
        assert_eq!(check_cast(Some(from), to).is_ok(), allowed);
    }
}
