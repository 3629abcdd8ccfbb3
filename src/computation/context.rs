//! The variable scope of one script execution.
use crate::expression::Scope;
use crate::model::{Dataset, ScalarType, Value};
use crate::validation::{DataPointRuleset, HierarchicalRuleset};
use indexmap::IndexMap;
use std::sync::Arc;

/// A bound value. Rulesets are stored as their own variants so a reference
/// of the wrong kind fails at compile time.
#[derive(Debug, Clone)]
pub enum Binding {
    Scalar { ty: Option<ScalarType>, value: Value },
    Dataset(Dataset),
    DatapointRuleset(Arc<DataPointRuleset>),
    HierarchicalRuleset(Arc<HierarchicalRuleset>),
}

impl Binding {
    pub fn scalar(value: impl Into<Value>) -> Self {
        let value = value.into();
        Binding::Scalar { ty: value.scalar_type(), value }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Scalar { .. } => "scalar",
            Binding::Dataset(_) => "dataset",
            Binding::DatapointRuleset(_) => "datapoint ruleset",
            Binding::HierarchicalRuleset(_) => "hierarchical ruleset",
        }
    }
}

impl From<Dataset> for Binding {
    fn from(dataset: Dataset) -> Self { Binding::Dataset(dataset) }
}

/// Name → binding. Assignment replaces the previous binding wholesale.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    bindings: IndexMap<String, Binding>,
}

impl EvaluationContext {
    pub fn new() -> Self { Self::default() }

    pub fn set(&mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Option<Binding> {
        self.bindings.insert(name.into(), binding.into())
    }

    pub fn set_scalar(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Binding> {
        self.set(name, Binding::scalar(value))
    }

    pub fn get(&self, name: &str) -> Option<&Binding> { self.bindings.get(name) }

    pub fn remove(&mut self, name: &str) -> Option<Binding> { self.bindings.shift_remove(name) }

    pub fn contains(&self, name: &str) -> bool { self.bindings.contains_key(name) }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.bindings.keys().map(String::as_str) }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        match self.bindings.get(name) {
            Some(Binding::Dataset(ds)) => Some(ds),
            _ => None,
        }
    }

    pub fn scalar(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(Binding::Scalar { value, .. }) => Some(value),
            _ => None,
        }
    }
}

impl Scope for EvaluationContext {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.scalar(name).cloned()
    }
}
