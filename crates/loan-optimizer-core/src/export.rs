//! Tabular rendering of a schedule: one row per month, four columns per loan.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::optimizer::report::calendar_month;
use crate::schedule::Schedule;
use crate::types::{LoanId, Money};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ScheduleTable {
    /// Build the table; calendar columns are included when `start` is known.
    pub fn from_schedule(schedule: &Schedule, start: Option<NaiveDate>) -> Self {
        let ids = schedule.loan_ids();

        let mut headers = vec!["Month".to_string()];
        if start.is_some() {
            headers.push("Year".to_string());
            headers.push("Calendar Month".to_string());
        }
        for id in &ids {
            headers.push(format!("Balance ({id})"));
            headers.push(format!("Interest ({id})"));
            headers.push(format!("Payment ({id})"));
            headers.push(format!("Remaining ({id})"));
        }

        let rows = schedule
            .iter()
            .map(|record| {
                let mut row = vec![record.month_index.to_string()];
                if let Some(start) = start {
                    match calendar_month(start, record.month_index) {
                        Some(date) => {
                            row.push(date.year().to_string());
                            row.push(date.format("%B").to_string());
                        }
                        None => {
                            row.push(String::new());
                            row.push(String::new());
                        }
                    }
                }
                for id in &ids {
                    row.push(amount(&record.opening_balances, *id));
                    row.push(amount(&record.interest_accrued, *id));
                    row.push(amount(&record.payments, *id));
                    row.push(amount(&record.ending_balances, *id));
                }
                row
            })
            .collect();

        ScheduleTable { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn amount(map: &std::collections::BTreeMap<LoanId, Money>, id: LoanId) -> String {
    map.get(&id)
        .map(|v| format!("{:.2}", v))
        .unwrap_or_default()
}
