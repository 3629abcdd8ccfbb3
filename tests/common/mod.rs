#![allow(dead_code)]
use vtl_core::{Binding, Component, DataStructure, Dataset, EngineConfig, Interpreter, ScalarType, Value};

pub fn interpreter(engine: &str) -> Interpreter {
    let config = EngineConfig { engine: engine.to_string(), ..EngineConfig::default() };
    Interpreter::new(config).unwrap()
}

pub fn dataset(components: Vec<Component>, rows: Vec<Vec<Value>>) -> Dataset {
    Dataset::from_values(DataStructure::new(components).unwrap(), rows).unwrap()
}

/// `DS_1(Id_1, Id_2, Id_3, Me_1)` with one CREDIT and one DEBIT row.
pub fn accounts() -> Dataset {
    dataset(
        vec![
            Component::identifier("Id_1", ScalarType::Integer),
            Component::identifier("Id_2", ScalarType::String),
            Component::identifier("Id_3", ScalarType::String),
            Component::measure("Me_1", ScalarType::Integer),
        ],
        vec![
            vec![2011i64.into(), "I".into(), "CREDIT".into(), 10i64.into()],
            vec![2011i64.into(), "I".into(), "DEBIT".into(), (-2i64).into()],
        ],
    )
}

/// `DS_2(Id_1, Id_2, Me_1, Me_2)` over two partitions.
pub fn measures() -> Dataset {
    dataset(
        vec![
            Component::identifier("Id_1", ScalarType::String),
            Component::identifier("Id_2", ScalarType::Integer),
            Component::measure("Me_1", ScalarType::Number),
            Component::measure("Me_2", ScalarType::String),
        ],
        vec![
            vec!["A".into(), 1i64.into(), 1.0f64.into(), "x".into()],
            vec!["A".into(), 2i64.into(), 3.0f64.into(), "y".into()],
            vec!["B".into(), 1i64.into(), 5.0f64.into(), Value::Null],
            vec!["B".into(), 2i64.into(), (-4.0f64).into(), "z".into()],
        ],
    )
}

pub fn bound_dataset<'a>(interpreter: &'a Interpreter, name: &str) -> &'a Dataset {
    match interpreter.get(name) {
        Some(Binding::Dataset(ds)) => ds,
        other => panic!("{} is not a dataset: {:?}", name, other.map(Binding::kind)),
    }
}

/// Rows as `name -> value` maps, sorted by identifier key.
pub fn column(ds: &Dataset, name: &str) -> Vec<Value> {
    ds.sorted_rows().iter().map(|row| ds.value(row, name).cloned().unwrap_or(Value::Null)).collect()
}
