//! Built-in function dispatch.
use super::ast::{Expr, Function, Position};
use super::{CompileError, CompileErrorKind, Compiler};
use crate::expression::operators::between;
use crate::expression::{functions as f, Expression, Operation};
use crate::model::{ScalarType, Value};
use crate::type_system::checker::{expect, expect_arity, expect_numeric, numeric_or_integer};
use crate::type_system::rules::arithmetic::{numeric_result, unify_all};

impl Compiler<'_> {
    pub(super) fn call(&mut self, function: Function, args: &[Expr], pos: Position) -> Result<Expression, CompileError> {
        if let Some(unsupported) = time_series(function) {
            return Err(CompileError::new(pos, CompileErrorKind::NotImplemented(unsupported.to_string())));
        }
        let args = args.iter().map(|a| self.compile(a)).collect::<Result<Vec<_>, _>>()?;
        let constants: Vec<Option<Value>> = args.iter().map(Compiler::constant_value).collect();
        self.lift(args, pos, |types: &[Option<ScalarType>]| operation(function, types, &constants))
    }
}

/// The time-series functions are part of the grammar only.
fn time_series(function: Function) -> Option<&'static str> {
    match function {
        Function::PeriodIndicator
        | Function::FillTimeSeries
        | Function::FlowToStock
        | Function::StockToFlow
        | Function::Timeshift
        | Function::TimeAgg => Some(function.name()),
        _ => None,
    }
}

/// Type-checks the arguments of `function` and returns its operation.
pub(super) fn operation(
    function: Function,
    types: &[Option<ScalarType>],
    constants: &[Option<Value>],
) -> Result<Operation, CompileErrorKind> {
    let name = function.name();
    let arity = |min: usize, max: usize| expect_arity(name, types.len(), min, max);
    let strings = |n: usize| types.iter().take(n).try_for_each(|t| expect(name, *t, ScalarType::String));
    let integers = |from: usize| types.iter().skip(from).try_for_each(|t| expect(name, *t, ScalarType::Integer));
    let numerics = || types.iter().try_for_each(|t| expect_numeric(name, *t));

    let op = match function {
        Function::Length | Function::Upper | Function::Lower | Function::Trim | Function::Ltrim | Function::Rtrim => {
            arity(1, 1)?;
            strings(1)?;
            match function {
                Function::Length => f::length(),
                Function::Upper => f::upper(),
                Function::Lower => f::lower(),
                Function::Trim => f::trim(),
                Function::Ltrim => f::ltrim(),
                _ => f::rtrim(),
            }
        }
        Function::Substr => {
            arity(1, 3)?;
            strings(1)?;
            integers(1)?;
            f::substr()
        }
        Function::Replace => {
            arity(2, 3)?;
            strings(3)?;
            f::replace()
        }
        Function::Instr => {
            arity(2, 4)?;
            strings(2)?;
            integers(2)?;
            f::instr()
        }
        Function::MatchCharacters => {
            arity(2, 2)?;
            strings(2)?;
            let pattern = constants.get(1).and_then(|c| c.as_ref()).and_then(Value::as_str);
            f::match_characters(pattern)?
        }
        Function::Abs => {
            arity(1, 1)?;
            numerics()?;
            f::abs(numeric_or_integer(types[0]))
        }
        Function::Ceil | Function::Floor => {
            arity(1, 1)?;
            numerics()?;
            if function == Function::Ceil { f::ceil() } else { f::floor() }
        }
        Function::Round | Function::Trunc => {
            arity(1, 2)?;
            expect_numeric(name, types[0])?;
            integers(1)?;
            if function == Function::Round { f::round() } else { f::trunc() }
        }
        Function::Sqrt | Function::Exp | Function::Ln => {
            arity(1, 1)?;
            numerics()?;
            match function {
                Function::Sqrt => f::sqrt(),
                Function::Exp => f::exp(),
                _ => f::ln(),
            }
        }
        Function::Log | Function::Power => {
            arity(2, 2)?;
            numerics()?;
            if function == Function::Log { f::log() } else { f::power() }
        }
        Function::Mod => {
            arity(2, 2)?;
            f::modulo(numeric_result(name, types[0], types[1])?)
        }
        Function::IsNull => {
            arity(1, 1)?;
            f::isnull()
        }
        Function::Nvl => {
            arity(2, 2)?;
            let ty = unify_all(name, types)?;
            f::nvl(ty.unwrap_or(ScalarType::String))
        }
        Function::Between => {
            arity(3, 3)?;
            between(types[0], types[1], types[2])?
        }
        Function::CurrentDate => {
            arity(0, 0)?;
            f::current_date()
        }
        Function::Levenshtein => {
            arity(2, 2)?;
            strings(2)?;
            f::levenshtein()
        }
        Function::PeriodIndicator
        | Function::FillTimeSeries
        | Function::FlowToStock
        | Function::StockToFlow
        | Function::Timeshift
        | Function::TimeAgg => return Err(CompileErrorKind::NotImplemented(name.to_string())),
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn op(function: Function, types: &[Option<ScalarType>]) -> Result<Operation, CompileErrorKind> {
        operation(function, types, &vec![None; types.len()])
    }

    #[rstest]
    #[case(Function::Length, vec![Some(ScalarType::String)], ScalarType::Integer)]
    #[case(Function::Substr, vec![Some(ScalarType::String), Some(ScalarType::Integer)], ScalarType::String)]
    #[case(Function::Abs, vec![Some(ScalarType::Integer)], ScalarType::Integer)]
    #[case(Function::Abs, vec![None], ScalarType::Integer)]
    #[case(Function::Round, vec![Some(ScalarType::Integer), Some(ScalarType::Integer)], ScalarType::Number)]
    #[case(Function::Mod, vec![Some(ScalarType::Integer), Some(ScalarType::Number)], ScalarType::Number)]
    #[case(Function::Nvl, vec![None, Some(ScalarType::Integer)], ScalarType::Integer)]
    #[case(Function::CurrentDate, vec![], ScalarType::Date)]
    fn test_result_types(#[case] function: Function, #[case] types: Vec<Option<ScalarType>>, #[case] expected: ScalarType) {
        assert_eq!(op(function, &types).unwrap().result, expected);
    }

    #[test]
    fn test_arity_and_type_errors() {
        let err = op(Function::Substr, &[Some(ScalarType::String); 4]).unwrap_err();
        assert_eq!(err.to_string(), "Expected 1 to 3 arguments to substr, found 4");
        assert!(op(Function::Upper, &[Some(ScalarType::Integer)]).is_err());
        assert!(op(Function::Sqrt, &[Some(ScalarType::Boolean)]).is_err());
        let err = op(Function::Replace, &[Some(ScalarType::String)]).unwrap_err();
        assert_eq!(err.to_string(), "Expected 2 to 3 arguments to replace, found 1");
    }

    #[test]
    fn test_time_series_not_implemented() {
        assert_eq!(op(Function::Timeshift, &[]).unwrap_err(), CompileErrorKind::NotImplemented("timeshift".into()));
        assert_eq!(time_series(Function::FlowToStock), Some("flow_to_stock"));
        assert_eq!(time_series(Function::Length), None);
    }

    #[test]
    fn test_constant_pattern_is_compiled_once() {
        let constants = vec![None, Some(Value::from("[a-z]+"))];
        let types = vec![Some(ScalarType::String), Some(ScalarType::String)];
        let op = operation(Function::MatchCharacters, &types, &constants).unwrap();
        assert_eq!(op.call(&[Value::from("abc"), Value::from("ignored")]).unwrap(), Value::Boolean(true));
        let bad = vec![None, Some(Value::from("("))];
        assert!(operation(Function::MatchCharacters, &types, &bad).is_err());
    }
}
