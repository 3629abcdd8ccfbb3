//! Ruleset definitions and the validation operators that apply them.
use super::ast::{DatapointRulesetDef, Expr, HierarchicalRulesetDef, Position};
use super::{CompileError, CompileErrorKind, Compiler, Frame};
use crate::computation::{Binding, EvaluationContext};
use crate::expression::{DatasetExpression, Expression, ScalarExpression};
use crate::model::{ScalarType, Value};
use crate::type_system::checker::expect;
use crate::validation::datapoint::{self, BoundDatapointRuleset, CompiledDatapointRule};
use crate::validation::hierarchy::{self, HierarchyOptions};
use crate::validation::simple::{self, CheckOperands};
use crate::validation::{
    positional_rule_id, DataPointRuleset, DatapointRule, HierarchicalRule, HierarchicalRuleset, HierarchyItem, InputMode,
    OutputMode, RuleVariable, RulesetKind, ValidationMode,
};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

// --- Definitions ---

fn rule_id(ruleset: &str, index: usize, name: Option<&String>, seen: &mut HashSet<String>, pos: Position) -> Result<String, CompileError> {
    let id = name.cloned().unwrap_or_else(|| positional_rule_id(ruleset, index));
    if !seen.insert(id.clone()) {
        return Err(CompileError::new(pos, CompileErrorKind::invalid_argument(ruleset, format!("rule {} is defined twice", id))));
    }
    Ok(id)
}

fn error_level(ruleset: &str, level: Option<i64>, pos: Position) -> Result<Option<i64>, CompileError> {
    match level {
        Some(l) if l < 0 => Err(CompileError::new(
            pos,
            CompileErrorKind::invalid_argument(ruleset, format!("error level {} is negative", l)),
        )),
        other => Ok(other),
    }
}

pub(super) fn define_datapoint(def: &DatapointRulesetDef) -> Result<DataPointRuleset, CompileError> {
    let mut visible = HashSet::new();
    for variable in &def.variables {
        let name = variable.alias.as_deref().unwrap_or(&variable.source);
        if !visible.insert(name.to_string()) {
            return Err(CompileError::new(def.pos, CompileErrorKind::NameCollision(name.to_string())));
        }
    }
    let mut seen = HashSet::new();
    let rules = def
        .rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            Ok(DatapointRule {
                id: rule_id(&def.name, i, rule.name.as_ref(), &mut seen, rule.pos)?,
                antecedent: rule.antecedent.clone(),
                consequent: rule.consequent.clone(),
                error_code: rule.error_code.clone(),
                error_level: error_level(&def.name, rule.error_level, rule.pos)?,
            })
        })
        .collect::<Result<Vec<_>, CompileError>>()?;
    debug!(ruleset = %def.name, rules = rules.len(), "datapoint ruleset defined");
    Ok(DataPointRuleset {
        name: def.name.clone(),
        kind: def.kind,
        variables: def.variables.iter().map(|v| RuleVariable { source: v.source.clone(), alias: v.alias.clone() }).collect(),
        rules,
    })
}

pub(super) fn define_hierarchical(def: &HierarchicalRulesetDef) -> Result<HierarchicalRuleset, CompileError> {
    let mut seen = HashSet::new();
    let rules = def
        .rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            if !rule.op.is_comparison() {
                return Err(CompileError::new(
                    rule.pos,
                    CompileErrorKind::invalid_argument(&def.name, format!("{} is not a comparison", rule.op)),
                ));
            }
            if rule.rhs.is_empty() {
                return Err(CompileError::new(rule.pos, CompileErrorKind::invalid_argument(&def.name, "rule has no right-hand codes")));
            }
            Ok(HierarchicalRule {
                id: rule_id(&def.name, i, rule.name.as_ref(), &mut seen, rule.pos)?,
                lhs: rule.lhs.clone(),
                op: rule.op,
                rhs: rule.rhs.iter().map(|(sign, code)| HierarchyItem { sign: *sign, code: code.clone() }).collect(),
                error_code: rule.error_code.clone(),
                error_level: error_level(&def.name, rule.error_level, rule.pos)?,
            })
        })
        .collect::<Result<Vec<_>, CompileError>>()?;
    debug!(ruleset = %def.name, rules = rules.len(), "hierarchical ruleset defined");
    Ok(HierarchicalRuleset { name: def.name.clone(), kind: def.kind, rule_variable: def.rule_variable.clone(), rules })
}

// --- Validation operators ---

impl Compiler<'_> {
    fn datapoint_ruleset(&self, name: &str, pos: Position) -> Result<Arc<DataPointRuleset>, CompileError> {
        match self.context.get(name) {
            Some(Binding::DatapointRuleset(rs)) => Ok(Arc::clone(rs)),
            Some(other) => Err(CompileError::new(
                pos,
                CompileErrorKind::BindingKind { name: name.to_string(), expected: "datapoint ruleset", found: other.kind() },
            )),
            None => Err(CompileError::new(pos, CompileErrorKind::UnknownRuleset(name.to_string()))),
        }
    }

    fn hierarchical_ruleset(&self, name: &str, pos: Position) -> Result<Arc<HierarchicalRuleset>, CompileError> {
        match self.context.get(name) {
            Some(Binding::HierarchicalRuleset(rs)) => Ok(Arc::clone(rs)),
            Some(other) => Err(CompileError::new(
                pos,
                CompileErrorKind::BindingKind { name: name.to_string(), expected: "hierarchical ruleset", found: other.kind() },
            )),
            None => Err(CompileError::new(pos, CompileErrorKind::UnknownRuleset(name.to_string()))),
        }
    }

    /// Compiles the rules of `ruleset` against the structure of `source`.
    ///
    /// Variable rulesets name components directly. Value-domain rulesets are
    /// bound through `components`, positionally, or else to the component
    /// declaring each value domain.
    fn bind_datapoint(
        &mut self,
        ruleset: &DataPointRuleset,
        source: &DatasetExpression,
        components: &[String],
        pos: Position,
    ) -> Result<BoundDatapointRuleset, CompileError> {
        let structure = source.structure_arc();
        let reference = |message: String| CompileError::new(pos, CompileErrorKind::InvalidRulesetReference(message));
        if !components.is_empty() && components.len() != ruleset.variables.len() {
            return Err(reference(format!(
                "{} declares {} variables, {} components given",
                ruleset.name,
                ruleset.variables.len(),
                components.len()
            )));
        }

        // 1. Resolve each variable to a dataset component.
        let mut names = IndexMap::new();
        for (i, variable) in ruleset.variables.iter().enumerate() {
            let component = match (ruleset.kind, components.get(i)) {
                (_, Some(given)) => structure.get(given),
                (RulesetKind::Variable, None) => structure.get(&variable.source),
                (RulesetKind::ValueDomain, None) => structure.by_value_domain(&variable.source),
            };
            let component = component.ok_or_else(|| {
                CompileError::new(
                    pos,
                    CompileErrorKind::UnknownComponent {
                        component: components.get(i).unwrap_or(&variable.source).clone(),
                        dataset: source.name().to_string(),
                    },
                )
            })?;
            let visible = variable.visible_name();
            if visible != component.name && structure.contains(visible) {
                return Err(CompileError::new(pos, CompileErrorKind::NameCollision(visible.to_string())));
            }
            names.insert(visible.to_string(), (component.name.clone(), component.value_type));
        }
        let declared: HashSet<&str> = names.values().map(|(c, _)| c.as_str()).collect();
        let measures = structure.measures().filter(|m| declared.contains(m.name.as_str())).map(|m| m.name.clone()).collect();

        // 2. Compile every rule in the variables' frame.
        let rules = self.within(Frame { names }, |c| {
            ruleset
                .rules
                .iter()
                .map(|rule| {
                    let antecedent = rule.antecedent.as_ref().map(|a| c.boolean(a, &rule.id)).transpose()?;
                    Ok(CompiledDatapointRule {
                        id: rule.id.clone(),
                        antecedent,
                        consequent: c.boolean(&rule.consequent, &rule.id)?,
                        error_code: rule.error_code.clone(),
                        error_level: rule.error_level,
                    })
                })
                .collect::<Result<Vec<_>, CompileError>>()
        })?;
        Ok(BoundDatapointRuleset { name: ruleset.name.clone(), rules, measures })
    }

    fn boolean(&mut self, expr: &Expr, rule: &str) -> Result<ScalarExpression, CompileError> {
        let compiled = self.scalar(expr)?;
        expect(rule, compiled.ty(), ScalarType::Boolean).map_err(|e| CompileError::new(expr.pos, e))?;
        Ok(compiled)
    }

    pub(super) fn check_datapoint(
        &mut self,
        dataset: &Expr,
        ruleset: &str,
        components: &[String],
        mode: OutputMode,
        pos: Position,
    ) -> Result<Expression, CompileError> {
        let source = self.dataset(dataset)?;
        let definition = self.datapoint_ruleset(ruleset, pos)?;
        let bound = self.bind_datapoint(&definition, &source, components, pos)?;
        let out = datapoint::output_structure(source.structure(), &bound, mode)
            .map_err(|e| CompileError::new(pos, crate::computation::ComputationError::from(e)))?;
        let engine = Arc::clone(&self.engine);
        Ok(Expression::Dataset(DatasetExpression::new(
            out,
            Arc::new(move |ctx: &EvaluationContext| engine.execute_validate_dp_ruleset(&source.resolve(ctx)?, &bound, mode, ctx)),
        )))
    }

    pub(super) fn check(
        &mut self,
        condition: &Expr,
        error_code: Option<&Expr>,
        error_level: Option<&Expr>,
        imbalance: Option<&Expr>,
        invalid: bool,
        pos: Position,
    ) -> Result<Expression, CompileError> {
        let fail = |kind: CompileErrorKind| CompileError::new(pos, kind);
        let condition_ds = self.dataset(condition)?;
        simple::sole_measure(condition_ds.structure(), condition_ds.name(), |t| t == ScalarType::Boolean, "boolean")
            .map_err(|e| fail(e.into()))?;
        let imbalance_ds = imbalance.map(|e| self.dataset(e)).transpose()?;
        let imbalance_type = match &imbalance_ds {
            Some(d) => Some(
                simple::sole_measure(d.structure(), d.name(), |t| t.is_numeric(), "numeric").map_err(|e| fail(e.into()))?.value_type,
            ),
            None => None,
        };
        let error_code = self.optional_scalar(error_code, ScalarType::String)?;
        let error_level = self.optional_scalar(error_level, ScalarType::Integer)?;
        let mode = if invalid { OutputMode::Invalid } else { OutputMode::All };
        let out = simple::output_structure(condition_ds.structure(), imbalance_type).map_err(|e| fail(e.into()))?;

        let engine = Arc::clone(&self.engine);
        Ok(Expression::Dataset(DatasetExpression::new(
            out,
            Arc::new(move |ctx: &EvaluationContext| {
                let condition = condition_ds.resolve(ctx)?;
                let imbalance = imbalance_ds.as_ref().map(|d| d.resolve(ctx)).transpose()?;
                let operands = CheckOperands {
                    condition: &condition,
                    imbalance: imbalance.as_ref(),
                    error_code: &error_code,
                    error_level: &error_level,
                };
                engine.execute_validation_simple(operands, mode, ctx)
            }),
        )))
    }

    /// An optional scalar argument of type `ty`; absent means a typed null.
    fn optional_scalar(&mut self, expr: Option<&Expr>, ty: ScalarType) -> Result<ScalarExpression, CompileError> {
        let Some(expr) = expr else {
            return Ok(ScalarExpression::typed_literal(Value::Null, Some(ty)));
        };
        let compiled = self.scalar(expr)?;
        expect("check", compiled.ty(), ty).map_err(|e| CompileError::new(expr.pos, e))?;
        Ok(compiled)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn check_hierarchy(
        &mut self,
        dataset: &Expr,
        ruleset: &str,
        rule_component: Option<&str>,
        validation: ValidationMode,
        input_mode: InputMode,
        output: OutputMode,
        pos: Position,
    ) -> Result<Expression, CompileError> {
        let source = self.dataset(dataset)?;
        let definition = self.hierarchical_ruleset(ruleset, pos)?;

        // The rule component defaults to the ruleset's rule variable; a value
        // domain names the component declaring it.
        let component = match (rule_component, definition.kind, definition.rule_variable.as_deref()) {
            (Some(given), _, _) => given.to_string(),
            (None, RulesetKind::Variable, Some(variable)) => variable.to_string(),
            (None, RulesetKind::ValueDomain, Some(domain)) => source
                .structure()
                .by_value_domain(domain)
                .map_or_else(|| domain.to_string(), |c| c.name.clone()),
            (None, _, None) => {
                return Err(CompileError::new(
                    pos,
                    CompileErrorKind::InvalidRulesetReference(format!("{} declares no rule component", definition.name)),
                ))
            }
        };
        let target = hierarchy::check_preconditions(source.structure(), source.name(), &component, input_mode)
            .map_err(|e| CompileError::new(pos, e))?;
        let config = self.engine.config();
        let options = HierarchyOptions {
            validation,
            output,
            non_null_policy: config.non_null_policy,
            keep_rule_component: config.keep_rule_component,
        };
        let out = hierarchy::output_structure(source.structure(), &target, &options)
            .map_err(|e| CompileError::new(pos, crate::computation::ComputationError::from(e)))?;

        let engine = Arc::clone(&self.engine);
        Ok(Expression::Dataset(DatasetExpression::new(
            out,
            Arc::new(move |ctx: &EvaluationContext| {
                engine.execute_check_hierarchy(&source.resolve(ctx)?, &definition, &target, validation, output)
            }),
        )))
    }
}
