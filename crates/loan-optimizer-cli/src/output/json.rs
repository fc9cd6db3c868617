use serde_json::Value;

/// Pretty-print JSON to stdout. The rendered table is dropped since the
/// schedule is already present in structured form.
pub fn print_json(value: &Value) {
    let mut value = value.clone();
    if let Value::Object(ref mut map) = value {
        map.remove("table");
    }
    match serde_json::to_string_pretty(&value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}
