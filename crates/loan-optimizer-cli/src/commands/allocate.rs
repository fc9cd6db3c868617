use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_optimizer_core::loans::{AprUnit, LoanInput};
use loan_optimizer_core::optimizer::allocator::{self, AllocationInput};

use super::plan::{parse_loan, StrategyArg};
use crate::input;

/// Arguments for a single-month allocation
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
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

    /// Surplus allocation strategy
    #[arg(long, default_value = "optimal")]
    pub strategy: StrategyArg,
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let alloc_input: AllocationInput = if let Some(ref path) = args.input {
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
        AllocationInput {
            budget,
            loans: args.loans,
            apr_unit: if args.apr_percent {
                AprUnit::Percent
            } else {
                AprUnit::Fraction
            },
            strategy: args.strategy.into(),
        }
    };

    let result = allocator::allocate_month(&alloc_input)?;
    Ok(serde_json::to_value(result)?)
}
