use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;
use std::fs::File;
use tracing::info;

use loan_optimizer_core::export::ScheduleTable;
use loan_optimizer_core::loans::{AprUnit, LoanInput};
use loan_optimizer_core::optimizer::allocator::AllocationStrategy;
use loan_optimizer_core::optimizer::plan::{self, PaymentPlanInput};
use loan_optimizer_core::optimizer::simulator::{SimulationConfig, DEFAULT_MAX_MONTHS};

use crate::input;

/// Surplus allocation strategy
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Linear program: surplus to the highest effective rate
    Optimal,
    /// Equal share of the surplus per active loan
    Even,
}

impl From<StrategyArg> for AllocationStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Optimal => AllocationStrategy::InterestMinimizing,
            StrategyArg::Even => AllocationStrategy::EvenSplit,
        }
    }
}

/// Arguments for a full payment plan
#[derive(Args)]
pub struct PlanArgs {
    /// Path to JSON or YAML plan file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Monthly budget available for loan payments
    #[arg(long)]
    pub budget: Option<Decimal>,

    /// Loan as balance:apr:min_payment[:deferment_months]; repeat per loan
    #[arg(long = "loan", value_parser = parse_loan)]
    pub loans: Vec<LoanInput>,

    /// APRs are percentages (6.5 = 6.5%) rather than fractions
    #[arg(long)]
    pub apr_percent: bool,

    /// Month ceiling before the run is declared stalled
    #[arg(long, default_value_t = DEFAULT_MAX_MONTHS)]
    pub max_months: u32,

    /// Calendar start month (YYYY-MM-DD) for payoff dates; defaults to the current month
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Surplus allocation strategy
    #[arg(long, default_value = "optimal")]
    pub strategy: StrategyArg,

    /// Skip the even-split comparison run
    #[arg(long)]
    pub no_compare: bool,

    /// Also write the amortisation table to this CSV file
    #[arg(long)]
    pub schedule_out: Option<String>,
}

/// Fills in a missing start date so payoff dates are calendar-anchored.
fn anchor_start_date(input: &mut PaymentPlanInput, today: NaiveDate) {
    if input.config.start_date.is_none() {
        input.config.start_date = Some(today);
    }
}

pub fn run_plan(args: PlanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut plan_input: PaymentPlanInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        let budget = args
            .budget
            .ok_or("--budget is required (or provide --input)")?;
        if args.loans.is_empty() {
            return Err("at least one --loan is required (or provide --input)".into());
        }

        PaymentPlanInput {
            budget,
            loans: args.loans.clone(),
            apr_unit: if args.apr_percent {
                AprUnit::Percent
            } else {
                AprUnit::Fraction
            },
            config: SimulationConfig {
                max_months: args.max_months,
                strategy: args.strategy.into(),
                start_date: args.start_date,
                ..Default::default()
            },
            compare_even_split: !args.no_compare,
        }
    };

    anchor_start_date(&mut plan_input, chrono::Local::now().date_naive());

    let result = plan::optimize_payment_plan(&plan_input)?;
    let table = ScheduleTable::from_schedule(&result.result.schedule, plan_input.config.start_date);

    if let Some(ref path) = args.schedule_out {
        write_schedule_csv(path, &table)?;
        info!(path = %path, rows = table.rows.len(), "wrote schedule");
    }

    let mut value = serde_json::to_value(result)?;
    if let Value::Object(ref mut map) = value {
        map.insert("table".into(), serde_json::to_value(&table)?);
    }
    Ok(value)
}

fn write_schedule_csv(path: &str, table: &ScheduleTable) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path).map_err(|e| format!("Failed to create '{}': {}", path, e))?;
    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse `balance:apr:min_payment[:deferment_months]`.
pub fn parse_loan(s: &str) -> Result<LoanInput, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if !(3..=4).contains(&parts.len()) {
        return Err(format!(
            "expected balance:apr:min_payment[:deferment_months], got '{s}'"
        ));
    }
    let decimal = |field: &str, raw: &str| {
        raw.trim()
            .parse::<Decimal>()
            .map_err(|e| format!("invalid {field} '{raw}': {e}"))
    };
    let deferment_months = match parts.get(3) {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid deferment_months '{raw}': {e}"))?,
        None => 0,
    };
    Ok(LoanInput {
        name: None,
        balance: decimal("balance", parts[0])?,
        apr: decimal("apr", parts[1])?,
        min_payment: decimal("min_payment", parts[2])?,
        deferment_months,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loan_with_deferment() {
        let loan = parse_loan("5000:0.06:50:6").unwrap();
        assert_eq!(loan.balance, Decimal::new(5000, 0));
        assert_eq!(loan.apr, Decimal::new(6, 2));
        assert_eq!(loan.min_payment, Decimal::new(50, 0));
        assert_eq!(loan.deferment_months, 6);
    }

    #[test]
    fn test_parse_loan_without_deferment() {
        let loan = parse_loan("1200:12:100").unwrap();
        assert_eq!(loan.deferment_months, 0);
    }

    #[test]
    fn test_parse_loan_rejects_bad_shapes() {
        assert!(parse_loan("1200:12").is_err());
        assert!(parse_loan("1200:x:100").is_err());
        assert!(parse_loan("1200:0.1:100:-1").is_err());
    }

    fn plan_input(start_date: Option<NaiveDate>) -> PaymentPlanInput {
        PaymentPlanInput {
            budget: Decimal::new(100, 0),
            loans: vec![parse_loan("1200:0.12:100").unwrap()],
            apr_unit: AprUnit::Fraction,
            config: SimulationConfig {
                start_date,
                ..Default::default()
            },
            compare_even_split: false,
        }
    }

    #[test]
    fn test_missing_start_date_defaults_to_today() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let mut input = plan_input(None);
        anchor_start_date(&mut input, today);
        assert_eq!(input.config.start_date, Some(today));
    }

    #[test]
    fn test_explicit_start_date_is_kept() {
        let explicit = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut input = plan_input(Some(explicit));
        anchor_start_date(&mut input, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(input.config.start_date, Some(explicit));
    }
}
