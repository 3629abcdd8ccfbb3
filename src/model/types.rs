//! Scalar types, component roles and period indicators.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The declared type of a component or scalar expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Integer,
    Number,
    Boolean,
    Date,
    Duration,
}

impl ScalarType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Integer | ScalarType::Number)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Number => "number",
            ScalarType::Boolean => "boolean",
            ScalarType::Date => "date",
            ScalarType::Duration => "duration",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The role a component plays inside a data structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Identifier,
    Measure,
    Attribute,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Identifier => "identifier",
            Role::Measure => "measure",
            Role::Attribute => "attribute",
        };
        f.write_str(s)
    }
}

/// A VTL duration value: the period indicator of a time period.
///
/// Indicators are ordered from the shortest to the longest period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodIndicator {
    #[serde(rename = "D")]
    Day,
    #[serde(rename = "W")]
    Week,
    #[serde(rename = "M")]
    Month,
    #[serde(rename = "Q")]
    Quarter,
    #[serde(rename = "S")]
    Semester,
    #[serde(rename = "A")]
    Annual,
}

impl PeriodIndicator {
    pub fn code(&self) -> char {
        match self {
            PeriodIndicator::Day => 'D',
            PeriodIndicator::Week => 'W',
            PeriodIndicator::Month => 'M',
            PeriodIndicator::Quarter => 'Q',
            PeriodIndicator::Semester => 'S',
            PeriodIndicator::Annual => 'A',
        }
    }
}

impl FromStr for PeriodIndicator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "D" => Ok(PeriodIndicator::Day),
            "W" => Ok(PeriodIndicator::Week),
            "M" => Ok(PeriodIndicator::Month),
            "Q" => Ok(PeriodIndicator::Quarter),
            "S" => Ok(PeriodIndicator::Semester),
            "A" => Ok(PeriodIndicator::Annual),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PeriodIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
