//! Hierarchical ruleset validation (`check_hierarchy`).
//!
//! Rows are grouped by every identifier except the rule component. Within a
//! group each rule looks up its left-hand code and right-hand codes by the
//! rule component's value, applies the validation mode to the missing and
//! null items, and compares the left-hand value with the signed sum of the
//! right-hand values.
use super::ruleset::{HierarchicalRule, HierarchicalRuleset, InputMode, OutputMode, Sign, ValidationMode};
use super::{BOOL_VAR, ERROR_CODE, ERROR_LEVEL, IMBALANCE, RULE_ID};
use crate::computation::ComputationError;
use crate::config::NonNullPolicy;
use crate::model::{Component, DataPoint, DataStructure, Dataset, IdentifierKey, ModelError, ScalarType, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Options that shape one `check_hierarchy` evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyOptions {
    pub validation: ValidationMode,
    pub output: OutputMode,
    pub non_null_policy: NonNullPolicy,
    pub keep_rule_component: bool,
}

/// The measure a hierarchy is checked over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyTarget {
    pub measure: String,
    pub measure_type: ScalarType,
    pub rule_component: String,
}

/// Checks the preconditions of `check_hierarchy`, in order: input mode,
/// single measure, numeric measure, rule component present as an identifier.
pub fn check_preconditions(
    structure: &DataStructure,
    dataset: &str,
    rule_component: &str,
    input_mode: InputMode,
) -> Result<HierarchyTarget, ComputationError> {
    if input_mode == InputMode::DatasetPriority {
        return Err(ComputationError::UnsupportedInputMode { mode: input_mode.to_string() });
    }
    let mut measures = structure.measures();
    let measure = match (measures.next(), measures.next()) {
        (Some(m), None) => m,
        _ => return Err(ComputationError::NotMonomeasure { dataset: dataset.to_string() }),
    };
    if !measure.value_type.is_numeric() {
        return Err(ComputationError::NonNumericMeasure { dataset: dataset.to_string(), measure: measure.name.clone() });
    }
    match structure.get(rule_component) {
        Some(c) if c.is_identifier() => {}
        _ => {
            return Err(ComputationError::MissingRuleComponent {
                component: rule_component.to_string(),
                dataset: dataset.to_string(),
            })
        }
    }
    Ok(HierarchyTarget {
        measure: measure.name.clone(),
        measure_type: measure.value_type,
        rule_component: rule_component.to_string(),
    })
}

pub fn output_structure(
    input: &DataStructure,
    target: &HierarchyTarget,
    options: &HierarchyOptions,
) -> Result<DataStructure, ModelError> {
    let mut components: Vec<Component> = input
        .identifiers()
        .filter(|c| options.keep_rule_component || c.name != target.rule_component)
        .cloned()
        .collect();
    components.push(Component::identifier(RULE_ID, ScalarType::String));
    if options.output != OutputMode::All {
        components.push(Component::measure(target.measure.clone(), target.measure_type));
    }
    if options.output != OutputMode::Invalid {
        components.push(Component::measure(BOOL_VAR, ScalarType::Boolean));
    }
    components.push(Component::measure(IMBALANCE, target.measure_type));
    components.push(Component::measure(ERROR_CODE, ScalarType::String));
    components.push(Component::measure(ERROR_LEVEL, ScalarType::Integer));
    DataStructure::new(components)
}

/// One group: the code → measure value map of rows sharing the other identifiers.
struct Group<'a> {
    exemplar: &'a DataPoint,
    values: HashMap<String, Value>,
}

pub fn validate(
    dataset: &Dataset,
    ruleset: &HierarchicalRuleset,
    target: &HierarchyTarget,
    options: &HierarchyOptions,
    out: Arc<DataStructure>,
) -> Result<Dataset, ComputationError> {
    let structure = dataset.structure();
    let rows = dataset.materialize();
    let index = |name: &str| structure.index_of(name).ok_or_else(|| ModelError::UnknownComponent(name.to_string()));
    let rule_index = index(target.rule_component.as_str())?;
    let measure_index = index(target.measure.as_str())?;
    let group_cols: Vec<usize> = structure
        .identifier_indices()
        .into_iter()
        .filter(|&i| i != rule_index)
        .collect();

    // 1. Group rows by the other identifiers.
    let mut groups: IndexMap<IdentifierKey, Group<'_>> = IndexMap::new();
    for row in rows.iter() {
        let code = row.get(rule_index);
        if code.is_null() {
            continue;
        }
        groups
            .entry(row.key(&group_cols))
            .or_insert_with(|| Group { exemplar: row, values: HashMap::new() })
            .values
            .insert(code.to_string(), row.get(measure_index).clone());
    }

    // 2. Evaluate every rule in every group.
    let mut output = Vec::new();
    for group in groups.values() {
        for rule in &ruleset.rules {
            let Some(result) = evaluate_rule(rule, &group.values, target.measure_type, options)? else {
                continue;
            };
            if options.output == OutputMode::Invalid && result.holds != Some(false) {
                continue;
            }
            trace!(rule = %rule.id, imbalance = %result.imbalance, "hierarchical rule evaluated");
            output.push(output_row(structure, group.exemplar, rule_index, rule, &result, options));
        }
    }
    debug!(ruleset = %ruleset.name, groups = groups.len(), rows = output.len(), "check_hierarchy");
    Ok(Dataset::from_rows_unchecked(out, output))
}

struct RuleResult {
    lhs: Value,
    imbalance: Value,
    holds: Option<bool>,
}

/// Applies the validation mode to one (group, rule). `None` means no row is emitted.
fn evaluate_rule(
    rule: &HierarchicalRule,
    values: &HashMap<String, Value>,
    measure_type: ScalarType,
    options: &HierarchyOptions,
) -> Result<Option<RuleResult>, ComputationError> {
    let lhs = values.get(&rule.lhs);
    let rhs: Vec<(Sign, Option<&Value>)> = rule.rhs.iter().map(|item| (item.sign, values.get(&item.code))).collect();
    let present = || std::iter::once(lhs).chain(rhs.iter().map(|(_, v)| *v)).flatten();

    let emitted = match options.validation {
        ValidationMode::NonNull => match options.non_null_policy {
            NonNullPolicy::SkipIncomplete => lhs.is_some() && rhs.iter().all(|(_, v)| v.is_some()) && present().all(|v| !v.is_null()),
            NonNullPolicy::ComputeAvailable => lhs.is_some() && rhs.iter().any(|(_, v)| v.is_some()),
        },
        ValidationMode::NonZero => present().any(|v| v.is_null() || !v.is_zero()),
        ValidationMode::PartialNull | ValidationMode::PartialZero => present().any(|v| !v.is_null()),
        ValidationMode::AlwaysNull | ValidationMode::AlwaysZero => true,
    };
    if !emitted {
        return Ok(None);
    }

    let zero = Value::zero_of(measure_type);
    let missing = if options.validation.substitutes_zero() { zero.clone() } else { Value::Null };
    let missing_rhs = match (options.validation, options.non_null_policy) {
        (ValidationMode::NonNull, NonNullPolicy::ComputeAvailable) => zero.clone(),
        _ => missing.clone(),
    };

    let lhs = lhs.cloned().unwrap_or(missing);
    let mut expected = zero;
    for (sign, value) in &rhs {
        let value = value.cloned().unwrap_or_else(|| missing_rhs.clone());
        expected = match sign {
            Sign::Plus => add(&expected, &value)?,
            Sign::Minus => subtract(&expected, &value)?,
        };
    }
    let imbalance = subtract(&lhs, &expected)?;
    let holds = if lhs.is_null() || expected.is_null() { None } else { Some(rule.op.holds(lhs.total_cmp(&expected))) };
    Ok(Some(RuleResult { lhs, imbalance, holds }))
}

fn add(a: &Value, b: &Value) -> Result<Value, ComputationError> {
    combine(a, b, i64::checked_add, |x, y| x + y)
}

fn subtract(a: &Value, b: &Value) -> Result<Value, ComputationError> {
    combine(a, b, i64::checked_sub, |x, y| x - y)
}

fn combine(a: &Value, b: &Value, int: fn(i64, i64) -> Option<i64>, float: fn(f64, f64) -> f64) -> Result<Value, ComputationError> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Integer(x), Value::Integer(y)) => int(*x, *y).map(Value::Integer).ok_or_else(|| ComputationError::overflow("check_hierarchy")),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Value::Number(float(x, y))),
            _ => Err(ComputationError::UnexpectedValue { expected: ScalarType::Number, found: format!("{}, {}", a, b) }),
        },
    }
}

fn output_row(
    structure: &DataStructure,
    exemplar: &DataPoint,
    rule_index: usize,
    rule: &HierarchicalRule,
    result: &RuleResult,
    options: &HierarchyOptions,
) -> DataPoint {
    let mut values: Vec<Value> = Vec::new();
    for (i, component) in structure.components().enumerate() {
        if !component.is_identifier() {
            continue;
        }
        if i == rule_index {
            if options.keep_rule_component {
                let code = Value::parse(&rule.lhs, component.value_type).unwrap_or_else(|| Value::String(rule.lhs.clone()));
                values.push(code);
            }
            continue;
        }
        values.push(exemplar.get(i).clone());
    }
    values.push(Value::String(rule.id.clone()));
    if options.output != OutputMode::All {
        values.push(result.lhs.clone());
    }
    if options.output != OutputMode::Invalid {
        values.push(result.holds.map_or(Value::Null, Value::Boolean));
    }
    values.push(result.imbalance.clone());
    let failed = result.holds == Some(false);
    values.push(if failed { rule.error_code.clone().into() } else { Value::Null });
    values.push(if failed { rule.error_level.into() } else { Value::Null });
    DataPoint::new(values)
}
