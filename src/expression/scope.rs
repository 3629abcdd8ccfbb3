//! Name resolution seen by a scalar expression while it is resolved.
use crate::model::{DataPoint, DataStructure, Value};

/// Anything a scalar expression can read named values from.
pub trait Scope: Sync {
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// A scope with no bindings, used for constant folding.
pub struct EmptyScope;

impl Scope for EmptyScope {
    fn lookup(&self, _name: &str) -> Option<Value> { None }
}

/// The components of one data point, falling back to an enclosing scope.
pub struct RowScope<'a> {
    structure: &'a DataStructure,
    point: &'a DataPoint,
    outer: &'a dyn Scope,
}

impl<'a> RowScope<'a> {
    pub fn new(structure: &'a DataStructure, point: &'a DataPoint, outer: &'a dyn Scope) -> Self {
        Self { structure, point, outer }
    }
}

impl Scope for RowScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        match self.structure.index_of(name) {
            Some(index) => Some(self.point.get(index).clone()),
            None => self.outer.lookup(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, ScalarType};

    struct Fixed;
    impl Scope for Fixed {
        fn lookup(&self, name: &str) -> Option<Value> {
            (name == "threshold").then_some(Value::Integer(10))
        }
    }

    #[test]
    fn test_row_scope_falls_back_to_outer() {
        let structure = DataStructure::new(vec![
            Component::identifier("Id_1", ScalarType::String),
            Component::measure("Me_1", ScalarType::Integer),
        ])
        .unwrap();
        let point = DataPoint::new(vec!["A".into(), Value::Null]);
        let scope = RowScope::new(&structure, &point, &Fixed);
        assert_eq!(scope.lookup("Me_1"), Some(Value::Null));
        assert_eq!(scope.lookup("threshold"), Some(Value::Integer(10)));
        assert_eq!(scope.lookup("missing"), None);
    }
}
