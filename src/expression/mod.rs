//! Typed, lazily-resolved expression nodes.
//!
//! An expression knows its static type before it is resolved. Scalar
//! expressions resolve against a [`Scope`]; dataset expressions resolve
//! against the whole [`EvaluationContext`] and carry their output structure
//! so the compiler can validate component references up front.
pub mod cast;
pub mod functions;
pub mod operators;
pub mod scope;

pub use self::operators::{BinaryOp, UnaryOp};
pub use self::scope::{EmptyScope, RowScope, Scope};

use crate::computation::{ComputationError, EvaluationContext};
use crate::model::{DataStructure, Dataset, ScalarType, Value};
use std::fmt;
use std::sync::Arc;

/// A row-level function over already-resolved operand values.
pub type Kernel = Arc<dyn Fn(&[Value]) -> Result<Value, ComputationError> + Send + Sync>;

/// A type-checked operator or function: its result type and its kernel.
#[derive(Clone)]
pub struct Operation {
    pub name: &'static str,
    pub result: ScalarType,
    pub kernel: Kernel,
    /// Volatile operations are never folded or cached.
    pub volatile: bool,
}

impl Operation {
    pub fn new(name: &'static str, result: ScalarType, kernel: Kernel) -> Self {
        Self { name, result, kernel, volatile: false }
    }

    /// An operation whose result is null whenever any operand is null.
    pub fn strict<F>(name: &'static str, result: ScalarType, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ComputationError> + Send + Sync + 'static,
    {
        let kernel: Kernel = Arc::new(move |args: &[Value]| {
            if args.iter().any(Value::is_null) {
                Ok(Value::Null)
            } else {
                f(args)
            }
        });
        Self::new(name, result, kernel)
    }

    pub fn into_volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, ComputationError> {
        (self.kernel)(args)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation").field("name", &self.name).field("result", &self.result).finish()
    }
}

pub type ScalarFn = Arc<dyn Fn(&dyn Scope) -> Result<Value, ComputationError> + Send + Sync>;

/// A scalar-valued expression. `ty` is `None` only for the untyped null literal.
#[derive(Clone)]
pub struct ScalarExpression {
    ty: Option<ScalarType>,
    eval: ScalarFn,
    constant: bool,
    volatile: bool,
}

impl ScalarExpression {
    pub fn literal(value: Value) -> Self {
        let ty = value.scalar_type();
        Self::typed_literal(value, ty)
    }

    pub fn typed_literal(value: Value, ty: Option<ScalarType>) -> Self {
        Self { ty, eval: Arc::new(move |_: &dyn Scope| Ok(value.clone())), constant: true, volatile: false }
    }

    /// A named value read from the scope (a scalar variable, or a component
    /// of the current row).
    pub fn variable(name: impl Into<String>, ty: ScalarType) -> Self {
        let name = name.into();
        let eval: ScalarFn = Arc::new(move |scope: &dyn Scope| {
            scope.lookup(&name).ok_or_else(|| ComputationError::Unbound(name.clone()))
        });
        Self { ty: Some(ty), eval, constant: false, volatile: false }
    }

    pub fn from_fn(ty: Option<ScalarType>, eval: ScalarFn) -> Self {
        Self { ty, eval, constant: false, volatile: false }
    }

    /// Applies an operation to resolved operands.
    pub fn apply(op: &Operation, args: Vec<ScalarExpression>) -> Self {
        let constant = !op.volatile && args.iter().all(|a| a.constant);
        let volatile = op.volatile || args.iter().any(|a| a.volatile);
        let kernel = Arc::clone(&op.kernel);
        let eval: ScalarFn = Arc::new(move |scope: &dyn Scope| {
            let values = args.iter().map(|a| a.resolve(scope)).collect::<Result<Vec<_>, _>>()?;
            kernel(&values)
        });
        Self { ty: Some(op.result), eval, constant, volatile }
    }

    /// Three-valued AND that skips the right operand once the left is false.
    pub fn and(left: ScalarExpression, right: ScalarExpression) -> Self {
        Self::short_circuit(left, right, false)
    }

    /// Three-valued OR that skips the right operand once the left is true.
    pub fn or(left: ScalarExpression, right: ScalarExpression) -> Self {
        Self::short_circuit(left, right, true)
    }

    fn short_circuit(left: ScalarExpression, right: ScalarExpression, dominant: bool) -> Self {
        let constant = left.constant && right.constant;
        let volatile = left.volatile || right.volatile;
        let eval: ScalarFn = Arc::new(move |scope: &dyn Scope| {
            let l = left.resolve(scope)?;
            if l.as_bool() == Some(dominant) {
                return Ok(Value::Boolean(dominant));
            }
            let r = right.resolve(scope)?;
            Ok(match (l.as_bool(), r.as_bool()) {
                (_, Some(b)) if b == dominant => Value::Boolean(dominant),
                (Some(_), Some(_)) => Value::Boolean(!dominant),
                _ => Value::Null,
            })
        });
        Self { ty: Some(ScalarType::Boolean), eval, constant, volatile }
    }

    /// `if cond then a else b`; a null condition selects the else branch.
    pub fn conditional(
        condition: ScalarExpression,
        then: ScalarExpression,
        otherwise: ScalarExpression,
        ty: Option<ScalarType>,
    ) -> Self {
        let constant = condition.constant && then.constant && otherwise.constant;
        let volatile = condition.volatile || then.volatile || otherwise.volatile;
        let eval: ScalarFn = Arc::new(move |scope: &dyn Scope| {
            match condition.resolve(scope)?.as_bool() {
                Some(true) => then.resolve(scope),
                _ => otherwise.resolve(scope),
            }
        });
        Self { ty, eval, constant, volatile }
    }

    pub fn ty(&self) -> Option<ScalarType> { self.ty }

    /// The type a component built from this expression is declared with.
    pub fn component_type(&self) -> ScalarType { self.ty.unwrap_or(ScalarType::String) }

    pub fn is_constant(&self) -> bool { self.constant }
    pub fn is_volatile(&self) -> bool { self.volatile }
    pub fn is_null_literal(&self) -> bool { self.ty.is_none() }

    pub fn resolve(&self, scope: &dyn Scope) -> Result<Value, ComputationError> {
        (self.eval)(scope)
    }

    /// Replaces a constant, non-volatile expression by its value.
    pub fn fold(self) -> Result<Self, ComputationError> {
        if self.constant && !self.volatile {
            let value = self.resolve(&EmptyScope)?;
            Ok(Self::typed_literal(value, self.ty))
        } else {
            Ok(self)
        }
    }
}

impl fmt::Debug for ScalarExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarExpression")
            .field("ty", &self.ty)
            .field("constant", &self.constant)
            .field("volatile", &self.volatile)
            .finish()
    }
}

pub type DatasetFn = Arc<dyn Fn(&EvaluationContext) -> Result<Dataset, ComputationError> + Send + Sync>;

/// A deferred dataset computation with a statically known structure.
#[derive(Clone)]
pub struct DatasetExpression {
    structure: Arc<DataStructure>,
    label: Option<String>,
    eval: DatasetFn,
}

impl DatasetExpression {
    pub fn new(structure: impl Into<Arc<DataStructure>>, eval: DatasetFn) -> Self {
        Self { structure: structure.into(), label: None, eval }
    }

    /// A reference to a dataset bound in the context.
    pub fn variable(name: impl Into<String>, structure: Arc<DataStructure>) -> Self {
        let name = name.into();
        let lookup = name.clone();
        let eval: DatasetFn = Arc::new(move |ctx: &EvaluationContext| {
            ctx.dataset(&lookup).cloned().ok_or_else(|| ComputationError::Unbound(lookup.clone()))
        });
        Self { structure, label: Some(name), eval }
    }

    /// An already-computed dataset.
    pub fn constant(dataset: Dataset) -> Self {
        let structure = dataset.structure_arc();
        Self::new(structure, Arc::new(move |_: &EvaluationContext| Ok(dataset.clone())))
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn structure(&self) -> &DataStructure { &self.structure }
    pub fn structure_arc(&self) -> Arc<DataStructure> { Arc::clone(&self.structure) }

    /// The name used in error messages.
    pub fn name(&self) -> &str { self.label.as_deref().unwrap_or("expression") }

    pub fn resolve(&self, ctx: &EvaluationContext) -> Result<Dataset, ComputationError> {
        (self.eval)(ctx)
    }
}

impl fmt::Debug for DatasetExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetExpression")
            .field("label", &self.label)
            .field("structure", &self.structure)
            .finish()
    }
}

/// The result of compiling one expression node.
#[derive(Debug, Clone)]
pub enum Expression {
    Scalar(ScalarExpression),
    Dataset(DatasetExpression),
}

impl Expression {
    pub fn kind(&self) -> &'static str {
        match self {
            Expression::Scalar(_) => "scalar",
            Expression::Dataset(_) => "dataset",
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarExpression> {
        match self {
            Expression::Scalar(s) => Some(s),
            Expression::Dataset(_) => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&DatasetExpression> {
        match self {
            Expression::Dataset(d) => Some(d),
            Expression::Scalar(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing() -> ScalarExpression {
        ScalarExpression::from_fn(Some(ScalarType::Boolean), Arc::new(|_: &dyn Scope| Err(ComputationError::DivisionByZero)))
    }

    #[test]
    fn test_and_short_circuits_on_false() {
        let expr = ScalarExpression::and(ScalarExpression::literal(false.into()), failing());
        assert_eq!(expr.resolve(&EmptyScope).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_three_valued_logic() {
        let null = || ScalarExpression::literal(Value::Null);
        let t = || ScalarExpression::literal(true.into());
        let f = || ScalarExpression::literal(false.into());
        assert_eq!(ScalarExpression::and(null(), f()).resolve(&EmptyScope).unwrap(), Value::Boolean(false));
        assert_eq!(ScalarExpression::and(null(), t()).resolve(&EmptyScope).unwrap(), Value::Null);
        assert_eq!(ScalarExpression::or(null(), t()).resolve(&EmptyScope).unwrap(), Value::Boolean(true));
        assert_eq!(ScalarExpression::or(f(), null()).resolve(&EmptyScope).unwrap(), Value::Null);
    }

    #[test]
    fn test_volatile_expression_is_not_folded() {
        let op = Operation::new("now", ScalarType::Integer, Arc::new(|_: &[Value]| Ok(Value::Integer(1)))).into_volatile();
        let expr = ScalarExpression::apply(&op, vec![]).fold().unwrap();
        assert!(expr.is_volatile());
        assert!(!expr.is_constant());
    }
}
