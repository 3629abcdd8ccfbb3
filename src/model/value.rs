//! The runtime value carried by data points and scalar expressions.
use super::types::{PeriodIndicator, ScalarType};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single (possibly null) scalar value.
///
/// `Null` is a normal data state and conforms to every declared type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    Duration(PeriodIndicator),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type of a non-null value.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(ScalarType::String),
            Value::Integer(_) => Some(ScalarType::Integer),
            Value::Number(_) => Some(ScalarType::Number),
            Value::Boolean(_) => Some(ScalarType::Boolean),
            Value::Date(_) => Some(ScalarType::Date),
            Value::Duration(_) => Some(ScalarType::Duration),
        }
    }

    pub fn conforms_to(&self, ty: ScalarType) -> bool {
        self.scalar_type().map_or(true, |t| t == ty)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of an Integer or Number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether the value is a numeric zero. Null is not zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Integer(i) => *i == 0,
            Value::Number(n) => *n == 0.0,
            _ => false,
        }
    }

    /// The additive identity of a numeric type.
    pub fn zero_of(ty: ScalarType) -> Value {
        match ty {
            ScalarType::Number => Value::Number(0.0),
            _ => Value::Integer(0),
        }
    }

    /// Parses the literal form of a value of type `ty`.
    pub fn parse(text: &str, ty: ScalarType) -> Option<Value> {
        let trimmed = text.trim();
        match ty {
            ScalarType::String => Some(Value::String(text.to_string())),
            ScalarType::Integer => trimmed.parse::<i64>().ok().map(Value::Integer),
            ScalarType::Number => trimmed.parse::<f64>().ok().map(Value::Number),
            ScalarType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Some(Value::Boolean(true)),
                "false" => Some(Value::Boolean(false)),
                _ => None,
            },
            ScalarType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok().map(Value::Date),
            ScalarType::Duration => trimmed.parse::<PeriodIndicator>().ok().map(Value::Duration),
        }
    }

    /// A total order used for sorting and ordering clauses.
    ///
    /// Null sorts before every other value. Integers and numbers compare
    /// numerically; values of unrelated types compare by type rank.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Duration(a), Value::Duration(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Date(_) => 4,
            Value::Duration(_) => 5,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Number(n) => {
                // 0.0 and -0.0 are equal, all NaNs are equal.
                let canonical = if *n == 0.0 {
                    0.0f64
                } else if n.is_nan() {
                    f64::NAN
                } else {
                    *n
                };
                canonical.to_bits().hash(state)
            }
            Value::Boolean(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Duration(p) => p.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Duration(p) => write!(f, "{}", p),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
