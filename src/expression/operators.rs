//! Unary and binary operator factories.
//!
//! Each factory type-checks its operand types and returns an [`Operation`]
//! whose kernel works on values, so the same operation can be applied to
//! scalar expressions or mapped over dataset measures.
use super::{Kernel, Operation};
use crate::computation::ComputationError;
use crate::model::{ScalarType, Value};
use crate::type_system::checker::{expect, expect_numeric, numeric_or_integer};
use crate::type_system::rules::arithmetic::{common_type, division_result, numeric_result};
use crate::type_system::TypeRuleError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Concat => "||",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    /// Whether an ordering satisfies this comparison.
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            BinaryOp::Eq => ordering == Ordering::Equal,
            BinaryOp::Ne => ordering != Ordering::Equal,
            BinaryOp::Lt => ordering == Ordering::Less,
            BinaryOp::Le => ordering != Ordering::Greater,
            BinaryOp::Gt => ordering == Ordering::Greater,
            BinaryOp::Ge => ordering != Ordering::Less,
            _ => false,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

pub fn unary(op: UnaryOp, operand: Option<ScalarType>) -> Result<Operation, TypeRuleError> {
    match op {
        UnaryOp::Plus => {
            expect_numeric("unary +", operand)?;
            Ok(Operation::strict("plus", numeric_or_integer(operand), |args| Ok(args[0].clone())))
        }
        UnaryOp::Minus => {
            expect_numeric("unary -", operand)?;
            Ok(Operation::strict("minus", numeric_or_integer(operand), |args| match &args[0] {
                Value::Integer(i) => i.checked_neg().map(Value::Integer).ok_or_else(|| ComputationError::overflow("-")),
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(unexpected(ScalarType::Number, other)),
            }))
        }
        UnaryOp::Not => {
            expect("not", operand, ScalarType::Boolean)?;
            Ok(Operation::strict("not", ScalarType::Boolean, |args| boolean(&args[0]).map(|b| Value::Boolean(!b))))
        }
    }
}

pub fn binary(op: BinaryOp, left: Option<ScalarType>, right: Option<ScalarType>) -> Result<Operation, TypeRuleError> {
    let symbol = op.symbol();
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
            let result = numeric_result(symbol, left, right)?;
            Ok(Operation::strict(symbol, result, move |args| arithmetic(op, result, &args[0], &args[1])))
        }
        BinaryOp::Div => {
            let result = division_result(left, right)?;
            Ok(Operation::strict(symbol, result, |args| {
                let (a, b) = (number(&args[0])?, number(&args[1])?);
                if b == 0.0 {
                    return Err(ComputationError::DivisionByZero);
                }
                Ok(Value::Number(a / b))
            }))
        }
        BinaryOp::Concat => {
            expect(symbol, left, ScalarType::String)?;
            expect(symbol, right, ScalarType::String)?;
            Ok(Operation::strict(symbol, ScalarType::String, |args| {
                Ok(Value::String(format!("{}{}", args[0], args[1])))
            }))
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            common_type(symbol, left, right)?;
            Ok(Operation::strict(symbol, ScalarType::Boolean, move |args| {
                Ok(Value::Boolean(op.holds(args[0].total_cmp(&args[1]))))
            }))
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            expect(symbol, left, ScalarType::Boolean)?;
            expect(symbol, right, ScalarType::Boolean)?;
            let kernel: Kernel = Arc::new(move |args: &[Value]| Ok(logical(op, &args[0], &args[1])));
            Ok(Operation::new(symbol, ScalarType::Boolean, kernel))
        }
    }
}

/// Three-valued logic over already-resolved operands.
fn logical(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match (op, left.as_bool(), right.as_bool()) {
        (BinaryOp::And, Some(false), _) | (BinaryOp::And, _, Some(false)) => Value::Boolean(false),
        (BinaryOp::And, Some(true), Some(true)) => Value::Boolean(true),
        (BinaryOp::Or, Some(true), _) | (BinaryOp::Or, _, Some(true)) => Value::Boolean(true),
        (BinaryOp::Or, Some(false), Some(false)) => Value::Boolean(false),
        (BinaryOp::Xor, Some(a), Some(b)) => Value::Boolean(a != b),
        _ => Value::Null,
    }
}

fn arithmetic(op: BinaryOp, result: ScalarType, a: &Value, b: &Value) -> Result<Value, ComputationError> {
    if result == ScalarType::Integer {
        let (x, y) = (integer(a)?, integer(b)?);
        let value = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            _ => x.checked_mul(y),
        };
        return value.map(Value::Integer).ok_or_else(|| ComputationError::overflow(op.symbol()));
    }
    let (x, y) = (number(a)?, number(b)?);
    Ok(Value::Number(match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        _ => x * y,
    }))
}

/// `x in (v1, v2, ...)` over a literal set; null `x` yields null.
pub fn in_set(operand: Option<ScalarType>, set: &[Value], negated: bool) -> Result<Operation, TypeRuleError> {
    let name = if negated { "not_in" } else { "in" };
    for value in set {
        common_type(name, operand, value.scalar_type())?;
    }
    // Normalise integers so that `1 in (1.0)` matches.
    let members: HashSet<Value> = set.iter().map(normalise_numeric).collect();
    Ok(Operation::strict(name, ScalarType::Boolean, move |args| {
        Ok(Value::Boolean(members.contains(&normalise_numeric(&args[0])) != negated))
    }))
}

fn normalise_numeric(value: &Value) -> Value {
    match value {
        Value::Integer(i) => Value::Number(*i as f64),
        other => other.clone(),
    }
}

/// `between(x, low, high)`, inclusive on both ends.
pub fn between(operand: Option<ScalarType>, low: Option<ScalarType>, high: Option<ScalarType>) -> Result<Operation, TypeRuleError> {
    common_type("between", operand, low)?;
    common_type("between", operand, high)?;
    Ok(Operation::strict("between", ScalarType::Boolean, |args| {
        let x = &args[0];
        Ok(Value::Boolean(x.total_cmp(&args[1]) != Ordering::Less && x.total_cmp(&args[2]) != Ordering::Greater))
    }))
}

// --- Value accessors shared by kernels ---

pub(crate) fn unexpected(expected: ScalarType, found: &Value) -> ComputationError {
    ComputationError::UnexpectedValue { expected, found: found.to_string() }
}

pub(crate) fn number(value: &Value) -> Result<f64, ComputationError> {
    value.as_f64().ok_or_else(|| unexpected(ScalarType::Number, value))
}

pub(crate) fn integer(value: &Value) -> Result<i64, ComputationError> {
    value.as_i64().ok_or_else(|| unexpected(ScalarType::Integer, value))
}

pub(crate) fn boolean(value: &Value) -> Result<bool, ComputationError> {
    value.as_bool().ok_or_else(|| unexpected(ScalarType::Boolean, value))
}

pub(crate) fn string(value: &Value) -> Result<&str, ComputationError> {
    value.as_str().ok_or_else(|| unexpected(ScalarType::String, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ScalarType::*;

    fn eval(op: BinaryOp, a: Value, b: Value) -> Result<Value, ComputationError> {
        binary(op, a.scalar_type(), b.scalar_type()).unwrap().call(&[a, b])
    }

    #[rstest]
    #[case(BinaryOp::Add, Value::Integer(2), Value::Integer(3), Value::Integer(5))]
    #[case(BinaryOp::Add, Value::Integer(2), Value::Number(0.5), Value::Number(2.5))]
    #[case(BinaryOp::Div, Value::Integer(7), Value::Integer(2), Value::Number(3.5))]
    #[case(BinaryOp::Mul, Value::Null, Value::Integer(2), Value::Null)]
    #[case(BinaryOp::Lt, Value::Integer(2), Value::Number(2.5), Value::Boolean(true))]
    #[case(BinaryOp::Eq, Value::from("a"), Value::Null, Value::Null)]
    #[case(BinaryOp::Concat, Value::from("ab"), Value::from("cd"), Value::from("abcd"))]
    #[case(BinaryOp::And, Value::Boolean(false), Value::Null, Value::Boolean(false))]
    #[case(BinaryOp::Or, Value::Null, Value::Boolean(true), Value::Boolean(true))]
    #[case(BinaryOp::Xor, Value::Null, Value::Boolean(true), Value::Null)]
    fn test_binary_operators(#[case] op: BinaryOp, #[case] a: Value, #[case] b: Value, #[case] expected: Value) {
        assert_eq!(eval(op, a, b).unwrap(), expected);
    }

    #[test]
    fn test_integer_overflow_is_error() {
        assert!(matches!(
            eval(BinaryOp::Add, Value::Integer(i64::MAX), Value::Integer(1)),
            Err(ComputationError::Overflow { .. })
        ));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        assert_eq!(eval(BinaryOp::Div, Value::Integer(1), Value::Integer(0)), Err(ComputationError::DivisionByZero));
    }

    #[rstest]
    #[case(BinaryOp::Add, Some(String), Some(Integer))]
    #[case(BinaryOp::Eq, Some(Date), Some(String))]
    #[case(BinaryOp::And, Some(Integer), Some(Boolean))]
    #[case(BinaryOp::Concat, Some(String), Some(Number))]
    fn test_mismatched_operands_fail_type_check(#[case] op: BinaryOp, #[case] l: Option<ScalarType>, #[case] r: Option<ScalarType>) {
        assert!(binary(op, l, r).is_err());
    }

    #[test]
    fn test_in_set_with_widening() {
        let op = in_set(Some(Integer), &[Value::Number(1.0), Value::Number(2.0)], false).unwrap();
        assert_eq!(op.call(&[Value::Integer(2)]).unwrap(), Value::Boolean(true));
        assert_eq!(op.call(&[Value::Null]).unwrap(), Value::Null);
        let not_in = in_set(Some(Integer), &[Value::Integer(1)], true).unwrap();
        assert_eq!(not_in.call(&[Value::Integer(3)]).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_between_inclusive() {
        let op = between(Some(Integer), Some(Integer), Some(Integer)).unwrap();
        assert_eq!(op.call(&[3i64.into(), 1i64.into(), 3i64.into()]).unwrap(), Value::Boolean(true));
        assert_eq!(op.call(&[4i64.into(), 1i64.into(), 3i64.into()]).unwrap(), Value::Boolean(false));
    }
}
