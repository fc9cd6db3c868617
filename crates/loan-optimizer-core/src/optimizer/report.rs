use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::simulator::{SimulationRun, SimulationState};
use crate::types::{LoanId, Money};

/// Per-loan totals over a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub id: LoanId,
    pub name: String,
    pub interest_paid: Money,
    pub total_paid: Money,
    /// First month the loan's ending balance is zero.
    pub payoff_month: Option<u32>,
    pub ending_balance: Money,
}

/// Aggregate view over a finished [`SimulationRun`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub terminal_state: SimulationState,
    pub months_simulated: u32,
    pub total_interest: Money,
    pub total_paid: Money,
    /// Only set when every loan was paid off.
    pub payoff_month: Option<u32>,
    pub months_remaining: Option<u32>,
    /// e.g. "1 year, 1 month"
    pub years_months: Option<String>,
    /// e.g. "January 2027"; requires a start date.
    pub payoff_date: Option<String>,
    pub remaining_balance: Money,
    pub loans: Vec<LoanSummary>,
}

impl ScheduleReport {
    pub fn from_run(run: &SimulationRun) -> Self {
        let schedule = &run.schedule;
        let paid_off = run.state == SimulationState::PaidOff;

        let payoff_month = if paid_off { schedule.payoff_month() } else { None };
        let payoff_date = match (payoff_month, run.config.start_date) {
            (Some(m), Some(start)) => calendar_month(start, m).map(month_label),
            _ => None,
        };

        let loans = run
            .loan_names
            .iter()
            .map(|(&id, name)| {
                let mut interest_paid = Decimal::ZERO;
                let mut total_paid = Decimal::ZERO;
                let mut loan_payoff = None;
                for record in schedule {
                    interest_paid += record.interest_accrued.get(&id).copied().unwrap_or_default();
                    total_paid += record.payments.get(&id).copied().unwrap_or_default();
                    if loan_payoff.is_none()
                        && record.ending_balances.get(&id).is_some_and(|b| b.is_zero())
                    {
                        loan_payoff = Some(record.month_index);
                    }
                }
                LoanSummary {
                    id,
                    name: name.clone(),
                    interest_paid,
                    total_paid,
                    payoff_month: loan_payoff,
                    ending_balance: schedule
                        .last()
                        .and_then(|r| r.ending_balances.get(&id).copied())
                        .unwrap_or_default(),
                }
            })
            .collect();

        ScheduleReport {
            terminal_state: run.state,
            months_simulated: schedule.len() as u32,
            total_interest: schedule.total_interest(),
            total_paid: schedule.total_paid(),
            payoff_month,
            months_remaining: payoff_month,
            years_months: payoff_month.map(years_months),
            payoff_date,
            remaining_balance: schedule.remaining_balance(),
            loans,
        }
    }
}

/// First day of the calendar month holding simulated month `month_index`.
pub fn calendar_month(start: NaiveDate, month_index: u32) -> Option<NaiveDate> {
    let first = start.with_day(1)?;
    first.checked_add_months(Months::new(month_index.saturating_sub(1)))
}

pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

fn years_months(months: u32) -> String {
    let (y, m) = (months / 12, months % 12);
    let plural = |n: u32, unit: &str| {
        if n == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };
    format!("{}, {}", plural(y, "year"), plural(m, "month"))
}
