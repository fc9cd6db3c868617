pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// True when a plan ran but ended infeasible or stalled.
pub fn is_failure(value: &Value) -> bool {
    value
        .pointer("/result/failure")
        .is_some_and(|f| !f.is_null())
}

/// The `{headers, rows}` schedule table attached by the plan command.
pub(crate) fn schedule_table(value: &Value) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let table = value.get("table")?;
    let headers = table
        .get("headers")?
        .as_array()?
        .iter()
        .map(format_scalar)
        .collect();
    let rows = table
        .get("rows")?
        .as_array()?
        .iter()
        .filter_map(|row| row.as_array())
        .map(|row| row.iter().map(format_scalar).collect())
        .collect();
    Some((headers, rows))
}

pub(crate) fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
