//! Kernels for the built-in scalar functions.
//!
//! Unless noted otherwise every function is null-strict. `isnull` and `nvl`
//! are null-aware, `current_date` is volatile.
use super::operators::{integer, number, string};
use super::{Kernel, Operation};
use crate::computation::ComputationError;
use crate::model::{ScalarType, Value};
use regex::Regex;
use std::sync::Arc;

// --- String functions ---

pub fn length() -> Operation {
    Operation::strict("length", ScalarType::Integer, |args| {
        Ok(Value::Integer(string(&args[0])?.chars().count() as i64))
    })
}

pub fn upper() -> Operation {
    Operation::strict("upper", ScalarType::String, |args| Ok(Value::String(string(&args[0])?.to_uppercase())))
}

pub fn lower() -> Operation {
    Operation::strict("lower", ScalarType::String, |args| Ok(Value::String(string(&args[0])?.to_lowercase())))
}

pub fn trim() -> Operation {
    Operation::strict("trim", ScalarType::String, |args| Ok(Value::String(string(&args[0])?.trim().to_string())))
}

pub fn ltrim() -> Operation {
    Operation::strict("ltrim", ScalarType::String, |args| Ok(Value::String(string(&args[0])?.trim_start().to_string())))
}

pub fn rtrim() -> Operation {
    Operation::strict("rtrim", ScalarType::String, |args| Ok(Value::String(string(&args[0])?.trim_end().to_string())))
}

/// `substr(s, start, length)`: `start` is 1-based, both bounds optional.
pub fn substr() -> Operation {
    Operation::strict("substr", ScalarType::String, |args| {
        let chars: Vec<char> = string(&args[0])?.chars().collect();
        let start = match args.get(1) {
            Some(v) => integer(v)?,
            None => 1,
        };
        if start < 1 {
            return Err(ComputationError::invalid_argument("substr", format!("start {} is not positive", start)));
        }
        let from = ((start - 1) as usize).min(chars.len());
        let to = match args.get(2) {
            Some(v) => {
                let len = integer(v)?;
                if len < 0 {
                    return Err(ComputationError::invalid_argument("substr", format!("length {} is negative", len)));
                }
                from.saturating_add(len as usize).min(chars.len())
            }
            None => chars.len(),
        };
        Ok(Value::String(chars[from..to].iter().collect()))
    })
}

/// `replace(s, pattern, replacement)`; the replacement defaults to the empty string.
pub fn replace() -> Operation {
    Operation::strict("replace", ScalarType::String, |args| {
        let s = string(&args[0])?;
        let pattern = string(&args[1])?;
        let replacement = match args.get(2) {
            Some(v) => string(v)?,
            None => "",
        };
        Ok(Value::String(s.replace(pattern, replacement)))
    })
}

/// `instr(s, pattern, start, occurrence)`: 1-based position, 0 when absent.
pub fn instr() -> Operation {
    Operation::strict("instr", ScalarType::Integer, |args| {
        let chars: Vec<char> = string(&args[0])?.chars().collect();
        let pattern: Vec<char> = string(&args[1])?.chars().collect();
        let start = args.get(2).map(integer).transpose()?.unwrap_or(1).max(1) as usize;
        let occurrence = args.get(3).map(integer).transpose()?.unwrap_or(1);
        if occurrence < 1 {
            return Err(ComputationError::invalid_argument("instr", "occurrence must be positive"));
        }
        if pattern.is_empty() || pattern.len() > chars.len() {
            return Ok(Value::Integer(0));
        }
        let mut seen = 0;
        for i in (start - 1)..=(chars.len() - pattern.len()) {
            if chars[i..i + pattern.len()] == pattern[..] {
                seen += 1;
                if seen == occurrence {
                    return Ok(Value::Integer(i as i64 + 1));
                }
            }
        }
        Ok(Value::Integer(0))
    })
}

/// `match_characters(s, pattern)`: whole-string regular expression match.
///
/// A constant pattern is compiled once; otherwise it is compiled per call.
pub fn match_characters(constant_pattern: Option<&str>) -> Result<Operation, ComputationError> {
    let compile = |p: &str| {
        Regex::new(&format!("^(?:{})$", p)).map_err(|e| ComputationError::invalid_argument("match_characters", e.to_string()))
    };
    let compiled = constant_pattern.map(compile).transpose()?;
    Ok(Operation::strict("match_characters", ScalarType::Boolean, move |args| {
        let s = string(&args[0])?;
        match &compiled {
            Some(re) => Ok(Value::Boolean(re.is_match(s))),
            None => Ok(Value::Boolean(compile(string(&args[1])?)?.is_match(s))),
        }
    }))
}

// --- Numeric functions ---

pub fn abs(ty: ScalarType) -> Operation {
    Operation::strict("abs", ty, |args| match &args[0] {
        Value::Integer(i) => i.checked_abs().map(Value::Integer).ok_or_else(|| ComputationError::overflow("abs")),
        other => Ok(Value::Number(number(other)?.abs())),
    })
}

pub fn ceil() -> Operation {
    Operation::strict("ceil", ScalarType::Integer, |args| to_integer("ceil", number(&args[0])?.ceil()))
}

pub fn floor() -> Operation {
    Operation::strict("floor", ScalarType::Integer, |args| to_integer("floor", number(&args[0])?.floor()))
}

/// `round(x, digits)`, half away from zero.
pub fn round() -> Operation {
    Operation::strict("round", ScalarType::Number, |args| {
        let scale = decimal_scale(args.get(1))?;
        Ok(Value::Number((number(&args[0])? * scale).round() / scale))
    })
}

pub fn trunc() -> Operation {
    Operation::strict("trunc", ScalarType::Number, |args| {
        let scale = decimal_scale(args.get(1))?;
        Ok(Value::Number((number(&args[0])? * scale).trunc() / scale))
    })
}

pub fn sqrt() -> Operation {
    Operation::strict("sqrt", ScalarType::Number, |args| {
        let x = number(&args[0])?;
        if x < 0.0 {
            return Err(ComputationError::invalid_argument("sqrt", format!("{} is negative", x)));
        }
        Ok(Value::Number(x.sqrt()))
    })
}

pub fn exp() -> Operation {
    Operation::strict("exp", ScalarType::Number, |args| Ok(Value::Number(number(&args[0])?.exp())))
}

pub fn ln() -> Operation {
    Operation::strict("ln", ScalarType::Number, |args| Ok(Value::Number(positive("ln", number(&args[0])?)?.ln())))
}

/// `log(x, base)`.
pub fn log() -> Operation {
    Operation::strict("log", ScalarType::Number, |args| {
        let x = positive("log", number(&args[0])?)?;
        let base = positive("log", number(&args[1])?)?;
        if base == 1.0 {
            return Err(ComputationError::invalid_argument("log", "base must not be 1"));
        }
        Ok(Value::Number(x.log(base)))
    })
}

pub fn power() -> Operation {
    Operation::strict("power", ScalarType::Number, |args| {
        Ok(Value::Number(number(&args[0])?.powf(number(&args[1])?)))
    })
}

/// `mod(a, b)`, with the sign of the divisor.
pub fn modulo(ty: ScalarType) -> Operation {
    Operation::strict("mod", ty, move |args| {
        if ty == ScalarType::Integer {
            let (a, b) = (integer(&args[0])?, integer(&args[1])?);
            if b == 0 {
                return Err(ComputationError::DivisionByZero);
            }
            let r = a.checked_rem(b).ok_or_else(|| ComputationError::overflow("mod"))?;
            return Ok(Value::Integer(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }));
        }
        let (a, b) = (number(&args[0])?, number(&args[1])?);
        if b == 0.0 {
            return Err(ComputationError::DivisionByZero);
        }
        Ok(Value::Number(a - b * (a / b).floor()))
    })
}

fn decimal_scale(digits: Option<&Value>) -> Result<f64, ComputationError> {
    let digits = digits.map(integer).transpose()?.unwrap_or(0);
    Ok(10f64.powi(digits.clamp(-300, 300) as i32))
}

fn positive(function: &str, x: f64) -> Result<f64, ComputationError> {
    if x <= 0.0 {
        return Err(ComputationError::invalid_argument(function, format!("{} is not positive", x)));
    }
    Ok(x)
}

fn to_integer(function: &str, x: f64) -> Result<Value, ComputationError> {
    if !x.is_finite() || x.abs() > i64::MAX as f64 {
        return Err(ComputationError::overflow(function));
    }
    Ok(Value::Integer(x as i64))
}

// --- Null functions ---

pub fn isnull() -> Operation {
    let kernel: Kernel = Arc::new(|args: &[Value]| Ok(Value::Boolean(args[0].is_null())));
    Operation::new("isnull", ScalarType::Boolean, kernel)
}

/// `nvl(x, default)`; `ty` is the unified type of both operands.
pub fn nvl(ty: ScalarType) -> Operation {
    let kernel: Kernel = Arc::new(|args: &[Value]| {
        Ok(if args[0].is_null() { args[1].clone() } else { args[0].clone() })
    });
    Operation::new("nvl", ty, kernel)
}

// --- Time and distance functions ---

pub fn current_date() -> Operation {
    let kernel: Kernel = Arc::new(|_: &[Value]| Ok(Value::Date(chrono::Local::now().date_naive())));
    Operation::new("current_date", ScalarType::Date, kernel).into_volatile()
}

pub fn levenshtein() -> Operation {
    Operation::strict("levenshtein", ScalarType::Integer, |args| {
        Ok(Value::Integer(edit_distance(string(&args[0])?, string(&args[1])?) as i64))
    })
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
