//! Executes statements in order against one evaluation context.
use crate::compiler::ast::Statement;
use crate::compiler::{Compiled, Compiler};
use crate::computation::{select_engine, Binding, EvaluationContext, ProcessingEngine};
use crate::config::EngineConfig;
use crate::display::{format_dataset, DEFAULT_ROW_LIMIT};
use crate::error::VtlError;
use crate::expression::Expression;
use std::sync::Arc;
use tracing::{debug, info, info_span, trace};

pub struct Interpreter {
    engine: Arc<dyn ProcessingEngine>,
    context: EvaluationContext,
}

impl Interpreter {
    pub fn new(config: EngineConfig) -> Result<Self, VtlError> {
        let engine = select_engine(&config)?;
        info!(engine = engine.name(), "interpreter ready");
        Ok(Self { engine, context: EvaluationContext::new() })
    }

    /// Starts from an existing context, e.g. one pre-loaded with input datasets.
    pub fn with_context(config: EngineConfig, context: EvaluationContext) -> Result<Self, VtlError> {
        let mut interpreter = Self::new(config)?;
        interpreter.context = context;
        Ok(interpreter)
    }

    pub fn engine(&self) -> &dyn ProcessingEngine { self.engine.as_ref() }
    pub fn context(&self) -> &EvaluationContext { &self.context }
    pub fn context_mut(&mut self) -> &mut EvaluationContext { &mut self.context }

    pub fn get(&self, name: &str) -> Option<&Binding> { self.context.get(name) }

    pub fn set(&mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Option<Binding> {
        self.context.set(name, binding)
    }

    /// Compiles and evaluates one statement, then binds its result under the
    /// statement's target. A failing statement leaves the context unchanged.
    pub fn execute(&mut self, statement: &Statement) -> Result<&Binding, VtlError> {
        let target = statement.target().to_string();
        let span = info_span!("statement", name = %target);
        let _guard = span.enter();

        let compiled = Compiler::new(&self.context, Arc::clone(&self.engine)).compile_statement(statement)?;
        let binding = match compiled {
            Compiled::Expression(Expression::Dataset(expr)) => {
                let dataset = expr.resolve(&self.context)?.into_materialized();
                debug!(rows = dataset.row_count(), "dataset bound");
                trace!("\n{}", format_dataset(&dataset, &target, DEFAULT_ROW_LIMIT));
                Binding::Dataset(dataset)
            }
            Compiled::Expression(Expression::Scalar(expr)) => {
                let value = expr.resolve(&self.context)?;
                debug!(%value, "scalar bound");
                Binding::Scalar { ty: expr.ty().or_else(|| value.scalar_type()), value }
            }
            Compiled::DatapointRuleset(ruleset) => Binding::DatapointRuleset(Arc::new(ruleset)),
            Compiled::HierarchicalRuleset(ruleset) => Binding::HierarchicalRuleset(Arc::new(ruleset)),
        };
        self.context.set(target.clone(), binding);
        self.context.get(&target).ok_or_else(|| crate::computation::ComputationError::Unbound(target).into())
    }

    /// Executes `statements` strictly in order, stopping at the first failure.
    pub fn run(&mut self, statements: &[Statement]) -> Result<(), VtlError> {
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(())
    }
}
