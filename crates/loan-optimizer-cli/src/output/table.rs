use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{format_scalar, schedule_table};

/// Format output as tables using the tabled crate: the summary first, then
/// per-loan totals and the month-by-month schedule when present.
pub fn print_table(value: &Value) {
    let result = value.get("result").unwrap_or(value);

    match result.get("report") {
        Some(report) => print_plan(result, report),
        None => print_flat_object(result),
    }

    if let Some((headers, rows)) = schedule_table(value) {
        if !rows.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(headers);
            for row in rows {
                builder.push_record(row);
            }
            println!("\nSchedule:");
            println!("{}", Table::from(builder));
        }
    }

    if let Some(Value::Array(warnings)) = value.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = value.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_plan(result: &Value, report: &Value) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for key in [
        "terminal_state",
        "total_interest",
        "total_paid",
        "payoff_date",
        "months_remaining",
        "years_months",
        "remaining_balance",
    ] {
        if let Some(val) = report.get(key).filter(|v| !v.is_null()) {
            builder.push_record([key, &format_scalar(val)]);
        }
    }
    for key in ["even_split_interest", "interest_saved"] {
        if let Some(val) = result.get(key).filter(|v| !v.is_null()) {
            builder.push_record([key, &format_scalar(val)]);
        }
    }
    println!("{}", Table::from(builder));

    if let Some(Value::Array(loans)) = report.get("loans") {
        let mut builder = Builder::default();
        builder.push_record(["Loan", "Name", "Interest", "Paid", "Payoff Month", "Ending Balance"]);
        for loan in loans {
            let field = |k: &str| loan.get(k).map(format_scalar).unwrap_or_default();
            builder.push_record([
                field("id"),
                field("name"),
                field("interest_paid"),
                field("total_paid"),
                field("payoff_month"),
                field("ending_balance"),
            ]);
        }
        println!("\nLoans:");
        println!("{}", Table::from(builder));
    }
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_scalar(val)]);
        }
        println!("{}", Table::from(builder));
    } else {
        println!("{}", format_scalar(value));
    }
}
