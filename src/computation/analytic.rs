//! Analytic (window) function evaluation.
//!
//! Rows are partitioned by the `partition by` components, stably sorted by
//! the `order by` components, and each row's frame is resolved from the
//! window specification before the aggregate kernel runs over it.
use super::error::ComputationError;
use super::kernel::aggregate;
use crate::model::{DataPoint, DataStructure, IdentifierKey, ModelError, ScalarType, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::trace;

pub const UNBOUNDED_PRECEDING: i64 = i64::MIN;
pub const UNBOUNDED_FOLLOWING: i64 = i64::MAX;
pub const CURRENT_ROW: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticFunction {
    Sum,
    Avg,
    Count,
    Median,
    Min,
    Max,
    StddevPop,
    StddevSamp,
    VarPop,
    VarSamp,
    FirstValue,
    LastValue,
    Lag,
    Lead,
    RatioToReport,
}

impl AnalyticFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticFunction::Sum => "sum",
            AnalyticFunction::Avg => "avg",
            AnalyticFunction::Count => "count",
            AnalyticFunction::Median => "median",
            AnalyticFunction::Min => "min",
            AnalyticFunction::Max => "max",
            AnalyticFunction::StddevPop => "stddev_pop",
            AnalyticFunction::StddevSamp => "stddev_samp",
            AnalyticFunction::VarPop => "var_pop",
            AnalyticFunction::VarSamp => "var_samp",
            AnalyticFunction::FirstValue => "first_value",
            AnalyticFunction::LastValue => "last_value",
            AnalyticFunction::Lag => "lag",
            AnalyticFunction::Lead => "lead",
            AnalyticFunction::RatioToReport => "ratio_to_report",
        }
    }

    pub fn is_implemented(&self) -> bool {
        !matches!(self, AnalyticFunction::Lag | AnalyticFunction::Lead | AnalyticFunction::RatioToReport)
    }

    /// Whether the function only applies to numeric measures.
    pub fn requires_numeric(&self) -> bool {
        !matches!(
            self,
            AnalyticFunction::Count
                | AnalyticFunction::Min
                | AnalyticFunction::Max
                | AnalyticFunction::FirstValue
                | AnalyticFunction::LastValue
        )
    }

    pub fn result_type(&self, measure: ScalarType) -> ScalarType {
        match self {
            AnalyticFunction::Count => ScalarType::Integer,
            AnalyticFunction::Avg
            | AnalyticFunction::Median
            | AnalyticFunction::StddevPop
            | AnalyticFunction::StddevSamp
            | AnalyticFunction::VarPop
            | AnalyticFunction::VarSamp
            | AnalyticFunction::RatioToReport => ScalarType::Number,
            _ => measure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderItem {
    pub component: String,
    #[serde(default)]
    pub descending: bool,
}

impl OrderItem {
    pub fn asc(component: &str) -> Self { Self { component: component.to_string(), descending: false } }
    pub fn desc(component: &str) -> Self { Self { component: component.to_string(), descending: true } }
}

/// Frame bounds relative to the current row. `i64::MIN`/`i64::MAX` stand
/// for unbounded preceding/following.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowSpec {
    /// Offsets in rows from the current position.
    DataPoints { from: i64, to: i64 },
    /// Offsets added to the current row's order key.
    Range { from: i64, to: i64 },
}

/// A resolved analytic invocation over one measure.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticCall {
    pub function: AnalyticFunction,
    pub source: String,
    pub target: String,
    pub partition_by: Vec<String>,
    pub order_by: Vec<OrderItem>,
    pub window: Option<WindowSpec>,
}

/// Computes the analytic value for every row, returned in input order.
pub fn evaluate(rows: &[DataPoint], structure: &DataStructure, call: &AnalyticCall) -> Result<Vec<Value>, ComputationError> {
    let index = |name: &str| structure.index_of(name).ok_or_else(|| ModelError::UnknownComponent(name.to_string()));
    let source = index(call.source.as_str())?;
    let measure_type = structure.component_at(source).map_or(ScalarType::Number, |c| c.value_type);
    let partition_cols = call.partition_by.iter().map(|n| index(n.as_str())).collect::<Result<Vec<_>, _>>()?;
    let order_cols = call
        .order_by
        .iter()
        .map(|o| index(o.component.as_str()).map(|i| (i, o.descending)))
        .collect::<Result<Vec<_>, _>>()?;

    // 1. Partition, keeping first-appearance order.
    let mut partitions: IndexMap<IdentifierKey, Vec<usize>> = IndexMap::new();
    for (i, row) in rows.iter().enumerate() {
        partitions.entry(row.key(&partition_cols)).or_default().push(i);
    }

    let mut output = vec![Value::Null; rows.len()];
    for members in partitions.values_mut() {
        // 2. Stable sort within the partition.
        members.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], &order_cols));
        let window = effective_window(call.window, !order_cols.is_empty());

        // 3. Resolve each frame and aggregate over it.
        let keys: Vec<Option<f64>> = match window {
            Some(WindowSpec::Range { .. }) => {
                let &(col, _) = order_cols.first().ok_or_else(|| {
                    ComputationError::invalid_argument(call.function.name(), "range window requires an order by component")
                })?;
                members.iter().map(|&m| rows[m].get(col).as_f64()).collect()
            }
            _ => Vec::new(),
        };
        let descending = order_cols.first().map_or(false, |&(_, d)| d);
        for (pos, &row) in members.iter().enumerate() {
            let (lo, hi) = match window {
                None => (0, members.len()),
                Some(WindowSpec::DataPoints { from, to }) => datapoint_frame(pos, members.len(), from, to),
                Some(WindowSpec::Range { from, to }) => range_frame(&keys, pos, from, to, descending),
            };
            let frame: Vec<&Value> = members[lo..hi].iter().map(|&m| rows[m].get(source)).collect();
            output[row] = aggregate(call.function, &frame, measure_type)?;
        }
    }
    trace!(function = call.function.name(), partitions = partitions.len(), "analytic evaluated");
    Ok(output)
}

fn compare_rows(a: &DataPoint, b: &DataPoint, order_cols: &[(usize, bool)]) -> Ordering {
    for &(col, descending) in order_cols {
        let ordering = a.get(col).total_cmp(b.get(col));
        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Without an explicit window the frame is the whole partition, or the
/// running frame up to the current row when the partition is ordered.
fn effective_window(window: Option<WindowSpec>, ordered: bool) -> Option<WindowSpec> {
    match window {
        Some(w) => Some(w),
        None if ordered => Some(WindowSpec::DataPoints { from: UNBOUNDED_PRECEDING, to: CURRENT_ROW }),
        None => None,
    }
}

/// Half-open `[lo, hi)` positions for a data point window.
fn datapoint_frame(pos: usize, len: usize, from: i64, to: i64) -> (usize, usize) {
    let pos = pos as i64;
    let lo = pos.saturating_add(from).max(0);
    let hi = pos.saturating_add(to).min(len as i64 - 1);
    if lo > hi {
        return (0, 0);
    }
    (lo as usize, hi as usize + 1)
}

/// Half-open `[lo, hi)` positions for a range window over sorted keys.
///
/// A null key frames its null peers only. Nulls sort first ascending and
/// last descending, so the two groups never interleave.
fn range_frame(keys: &[Option<f64>], pos: usize, from: i64, to: i64, descending: bool) -> (usize, usize) {
    let Some(key) = keys[pos] else {
        let start = keys.iter().position(Option::is_none).unwrap_or(0);
        let end = start + keys[start..].iter().take_while(|k| k.is_none()).count();
        return (start, end);
    };
    let bound = |offset: i64| match offset {
        UNBOUNDED_PRECEDING => f64::NEG_INFINITY,
        UNBOUNDED_FOLLOWING => f64::INFINITY,
        o => key + o as f64,
    };
    let (low, high) = if descending {
        // Preceding rows carry larger keys.
        (key - (bound(to) - key), key - (bound(from) - key))
    } else {
        (bound(from), bound(to))
    };
    let inside = |k: &Option<f64>| k.map_or(false, |k| k >= low && k <= high);
    let lo = keys.iter().position(inside).unwrap_or(keys.len());
    let hi = lo + keys[lo..].iter().take_while(|k| inside(*k)).count();
    (lo, hi)
}
