use crate::model::{Dataset, Role, Value};
use std::fmt::Write;

/// Rows shown before the table is cut off with a summary line.
pub const DEFAULT_ROW_LIMIT: usize = 50;

/// Renders `dataset` as a fixed-width text table.
///
/// Rows are sorted by identifier key so the output is stable across engines.
/// Identifier headers are marked with `*`, attributes with `@`.
pub fn format_dataset(dataset: &Dataset, name: &str, limit: usize) -> String {
    let structure = dataset.structure();
    let headers: Vec<String> = structure
        .components()
        .map(|c| match c.role {
            Role::Identifier => format!("*{}", c.name),
            Role::Attribute => format!("@{}", c.name),
            Role::Measure => c.name.clone(),
        })
        .collect();

    let rows = dataset.sorted_rows();
    let shown: Vec<Vec<String>> = rows
        .iter()
        .take(limit)
        .map(|row| row.values().iter().map(cell).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &shown {
        for (w, value) in widths.iter_mut().zip(row) {
            *w = (*w).max(value.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "DATASET '{}' ({} rows):", name, rows.len());
    write_line(&mut output, &headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(output, "{}", rule.join("-+-"));
    for row in &shown {
        write_line(&mut output, row, &widths);
    }
    if rows.len() > shown.len() {
        let _ = writeln!(output, "... {} more rows", rows.len() - shown.len());
    }
    output
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

fn write_line(output: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells.iter().zip(widths).map(|(c, w)| format!("{:<width$}", c, width = *w)).collect();
    let _ = writeln!(output, "{}", padded.join(" | ").trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, DataStructure, ScalarType};

    fn dataset() -> Dataset {
        let structure = DataStructure::new(vec![
            Component::identifier("Id_1", ScalarType::String),
            Component::measure("Me_1", ScalarType::Integer),
            Component::attribute("At_1", ScalarType::String),
        ])
        .unwrap();
        Dataset::from_values(
            structure,
            vec![
                vec!["B".into(), 20i64.into(), Value::Null],
                vec!["A".into(), 1i64.into(), "x".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rows_sorted_with_role_markers() {
        let text = format_dataset(&dataset(), "DS_1", DEFAULT_ROW_LIMIT);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "DATASET 'DS_1' (2 rows):");
        assert_eq!(lines[1], "*Id_1 | Me_1 | @At_1");
        assert_eq!(lines[2], "------+------+------");
        assert_eq!(lines[3], "\"A\"   | 1    | \"x\"");
        assert_eq!(lines[4], "\"B\"   | 20   | null");
    }

    #[test]
    fn test_row_limit_summary() {
        let text = format_dataset(&dataset(), "DS_1", 1);
        assert_eq!(text.lines().count(), 5);
        assert!(text.ends_with("... 1 more rows\n"));
    }
}
