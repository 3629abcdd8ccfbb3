//! Components and the ordered data structure they form.
use super::error::ModelError;
use super::types::{Role, ScalarType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A typed, role-tagged column declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub value_type: ScalarType,
    pub role: Role,
    /// The value domain the component's values are drawn from, used to bind
    /// value-domain rulesets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_domain: Option<String>,
}

impl Component {
    pub fn new(name: impl Into<String>, value_type: ScalarType, role: Role) -> Self {
        Self { name: name.into(), value_type, role, value_domain: None }
    }

    pub fn identifier(name: impl Into<String>, value_type: ScalarType) -> Self {
        Self::new(name, value_type, Role::Identifier)
    }

    pub fn measure(name: impl Into<String>, value_type: ScalarType) -> Self {
        Self::new(name, value_type, Role::Measure)
    }

    pub fn attribute(name: impl Into<String>, value_type: ScalarType) -> Self {
        Self::new(name, value_type, Role::Attribute)
    }

    pub fn with_value_domain(mut self, domain: impl Into<String>) -> Self {
        self.value_domain = Some(domain.into());
        self
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self.clone() }
    }

    pub fn is_identifier(&self) -> bool { self.role == Role::Identifier }
    pub fn is_measure(&self) -> bool { self.role == Role::Measure }
}

/// An ordered mapping of component name to component.
///
/// Insertion order is the canonical column order. Every structure has at
/// least one identifier and unique component names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DataStructure {
    components: IndexMap<String, Component>,
}

impl DataStructure {
    pub fn new(components: impl IntoIterator<Item = Component>) -> Result<Self, ModelError> {
        let mut map = IndexMap::new();
        for component in components {
            if map.contains_key(&component.name) {
                return Err(ModelError::DuplicateComponent(component.name));
            }
            map.insert(component.name.clone(), component);
        }
        if !map.values().any(Component::is_identifier) {
            return Err(ModelError::NoIdentifier);
        }
        Ok(Self { components: map })
    }

    pub fn len(&self) -> usize { self.components.len() }
    pub fn is_empty(&self) -> bool { self.components.is_empty() }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.components.get_index_of(name)
    }

    pub fn component_at(&self, index: usize) -> Option<&Component> {
        self.components.get_index(index).map(|(_, c)| c)
    }

    /// Looks up a component, failing with `UnknownComponent`.
    pub fn require(&self, name: &str) -> Result<&Component, ModelError> {
        self.get(name).ok_or_else(|| ModelError::UnknownComponent(name.to_string()))
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &Component> {
        self.components().filter(|c| c.role == Role::Identifier)
    }

    pub fn measures(&self) -> impl Iterator<Item = &Component> {
        self.components().filter(|c| c.role == Role::Measure)
    }

    pub fn identifier_names(&self) -> Vec<String> {
        self.identifiers().map(|c| c.name.clone()).collect()
    }

    pub fn measure_names(&self) -> Vec<String> {
        self.measures().map(|c| c.name.clone()).collect()
    }

    /// Positions of the identifier components, in structure order.
    pub fn identifier_indices(&self) -> Vec<usize> {
        self.components
            .values()
            .enumerate()
            .filter(|(_, c)| c.is_identifier())
            .map(|(i, _)| i)
            .collect()
    }

    /// The component declaring the given value domain, if any.
    pub fn by_value_domain(&self, domain: &str) -> Option<&Component> {
        self.components().find(|c| c.value_domain.as_deref() == Some(domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_requires_identifier() {
        let err = DataStructure::new(vec![Component::measure("Me_1", ScalarType::Integer)]).unwrap_err();
        assert_eq!(err, ModelError::NoIdentifier);
    }

    #[test]
    fn test_structure_rejects_duplicate_names() {
        let err = DataStructure::new(vec![
            Component::identifier("Id_1", ScalarType::String),
            Component::measure("Id_1", ScalarType::Integer),
        ])
        .unwrap_err();
        assert_eq!(err, ModelError::DuplicateComponent("Id_1".into()));
    }

    #[test]
    fn test_structure_preserves_insertion_order() {
        let s = DataStructure::new(vec![
            Component::measure("b", ScalarType::Integer),
            Component::identifier("a", ScalarType::String),
            Component::attribute("c", ScalarType::String),
        ])
        .unwrap();
        assert_eq!(s.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(s.identifier_indices(), vec![1]);
    }
}
