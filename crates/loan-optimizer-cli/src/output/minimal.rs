use serde_json::Value;

use super::format_scalar;

/// Print just the headline answer.
///
/// Plans print the payoff date (or month count) and total interest; a failed
/// plan prints its failure message. Single-month allocations print one
/// `id=payment` pair per loan.
pub fn print_minimal(value: &Value) {
    let result = value.get("result").unwrap_or(value);

    if let Some(report) = result.get("report") {
        if let Some(message) = result.pointer("/failure/message") {
            println!("{}", format_scalar(message));
            return;
        }
        let when = report
            .get("payoff_date")
            .filter(|v| !v.is_null())
            .or_else(|| report.get("months_remaining"))
            .map(format_scalar)
            .unwrap_or_default();
        let interest = report
            .get("total_interest")
            .map(format_scalar)
            .unwrap_or_default();
        println!("{} {}", when, interest);
        return;
    }

    if let Some(Value::Object(payments)) = result.get("payments") {
        let pairs: Vec<String> = payments
            .iter()
            .map(|(id, amount)| format!("{}={}", id, format_scalar(amount)))
            .collect();
        println!("{}", pairs.join(" "));
        return;
    }

    println!("{}", format_scalar(result));
}
