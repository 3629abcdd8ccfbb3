//! Row-at-a-time evaluation strategies.
//!
//! Both strategies return results in input order, so engines built on either
//! produce identical datasets.
use super::error::ComputationError;
use crate::model::DataPoint;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowExecutor {
    Sequential,
    /// Evaluates rows on the rayon thread pool.
    Parallel,
}

impl RowExecutor {
    pub fn map<T, F>(&self, rows: &[DataPoint], f: F) -> Result<Vec<T>, ComputationError>
    where
        T: Send,
        F: Fn(&DataPoint) -> Result<T, ComputationError> + Sync + Send,
    {
        match self {
            RowExecutor::Sequential => rows.iter().map(f).collect(),
            RowExecutor::Parallel => rows.par_iter().map(f).collect(),
        }
    }

    /// Maps each row to zero or more output rows.
    pub fn flat_map<T, F>(&self, rows: &[DataPoint], f: F) -> Result<Vec<T>, ComputationError>
    where
        T: Send,
        F: Fn(&DataPoint) -> Result<Vec<T>, ComputationError> + Sync + Send,
    {
        let nested = self.map(rows, f)?;
        Ok(nested.into_iter().flatten().collect())
    }

    /// Keeps the rows for which `f` returns `Some`.
    pub fn filter_map<T, F>(&self, rows: &[DataPoint], f: F) -> Result<Vec<T>, ComputationError>
    where
        T: Send,
        F: Fn(&DataPoint) -> Result<Option<T>, ComputationError> + Sync + Send,
    {
        let mapped = self.map(rows, f)?;
        Ok(mapped.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn rows(n: i64) -> Vec<DataPoint> {
        (0..n).map(|i| DataPoint::new(vec![Value::Integer(i)])).collect()
    }

    #[test]
    fn test_parallel_preserves_order() {
        let input = rows(1000);
        let f = |p: &DataPoint| Ok(p.get(0).as_i64().unwrap_or_default() * 2);
        let sequential = RowExecutor::Sequential.map(&input, f).unwrap();
        let parallel = RowExecutor::Parallel.map(&input, f).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_first_error_is_returned() {
        let input = rows(10);
        let result = RowExecutor::Parallel.filter_map(&input, |p: &DataPoint| match p.get(0).as_i64() {
            Some(5) => Err(ComputationError::DivisionByZero),
            other => Ok(other),
        });
        assert_eq!(result, Err(ComputationError::DivisionByZero));
    }
}
