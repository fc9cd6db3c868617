use serde_json::Value;
use std::io;

use super::{format_scalar, schedule_table};

/// Write output as CSV to stdout.
///
/// Plans print the amortisation table, one row per month; anything else
/// prints as two-column `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    if let Some((headers, rows)) = schedule_table(value) {
        let _ = wtr.write_record(&headers);
        for row in &rows {
            let _ = wtr.write_record(row);
        }
    } else {
        let fields = value
            .get("result")
            .and_then(|r| r.as_object())
            .or_else(|| value.as_object());
        let _ = wtr.write_record(["field", "value"]);
        if let Some(map) = fields {
            for (key, val) in map {
                let _ = wtr.write_record([key.as_str(), &format_scalar(val)]);
            }
        } else {
            let _ = wtr.write_record(["value", &format_scalar(value)]);
        }
    }

    let _ = wtr.flush();
}
