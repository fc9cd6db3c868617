use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::allocator::AllocationStrategy;
use super::report::ScheduleReport;
use super::simulator::{simulate, HaltReason, SimulationConfig, SimulationRun, SimulationState};
use crate::loans::{validate_budget, AprUnit, LoanInput, LoanSet};
use crate::schedule::Schedule;
use crate::types::*;
use crate::LoanOptimizerResult;

/// Input for a full payment plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlanInput {
    /// Fixed amount available for loan payments every month.
    pub budget: Money,
    pub loans: Vec<LoanInput>,
    #[serde(default)]
    pub apr_unit: AprUnit,
    #[serde(default)]
    pub config: SimulationConfig,
    /// Re-run with an even split of surplus budget for comparison.
    #[serde(default = "default_compare")]
    pub compare_even_split: bool,
}

fn default_compare() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InfeasibleBudget,
    StalledSimulation,
}

/// Structured description of a run that did not reach payoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFailure {
    pub kind: FailureKind,
    pub month: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<Money>,
    pub message: String,
}

impl PlanFailure {
    fn from_halt(halt: &HaltReason) -> Self {
        match halt {
            HaltReason::InfeasibleBudget {
                month,
                required,
                budget,
                shortfall,
            } => PlanFailure {
                kind: FailureKind::InfeasibleBudget,
                month: *month,
                shortfall: Some(*shortfall),
                message: format!(
                    "Month {month}: minimum payments of {required} exceed the budget of {budget} by {shortfall}"
                ),
            },
            HaltReason::MonthCeiling {
                months,
                remaining_balance,
            } => PlanFailure {
                kind: FailureKind::StalledSimulation,
                month: *months,
                shortfall: None,
                message: format!(
                    "Loans not paid off within {months} months ({remaining_balance} still owed)"
                ),
            },
            HaltReason::NoProgress {
                months,
                window,
                remaining_balance,
            } => PlanFailure {
                kind: FailureKind::StalledSimulation,
                month: *months,
                shortfall: None,
                message: format!(
                    "Balance has not decreased for {window} months; budget does not outpace interest ({remaining_balance} still owed)"
                ),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlanOutput {
    pub report: ScheduleReport,
    pub schedule: Schedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PlanFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub even_split_interest: Option<Money>,
    /// Interest avoided relative to the even-split baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_saved: Option<Money>,
}

/// Optimise monthly payments across all loans and amortise to payoff.
///
/// Invalid inputs fail fast. Infeasible or stalled runs still succeed: the
/// partial schedule is returned with `failure` set and the terminal state
/// recorded in the report.
pub fn optimize_payment_plan(
    input: &PaymentPlanInput,
) -> LoanOptimizerResult<ComputationOutput<PaymentPlanOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_budget(input.budget)?;
    let loans = LoanSet::from_inputs(&input.loans, input.apr_unit)?;

    if input.config.strategy != AllocationStrategy::InterestMinimizing {
        warnings.push(format!(
            "Strategy {:?} does not minimise interest; surplus is not directed by rate",
            input.config.strategy
        ));
    }

    let first_month_interest = loans.total_monthly_interest();
    if input.budget <= first_month_interest {
        warnings.push(format!(
            "Budget {} does not exceed first-month interest {}; balances cannot decrease",
            input.budget, first_month_interest
        ));
    }

    let run = simulate(loans.clone(), input.budget, input.config.clone())?;
    let report = ScheduleReport::from_run(&run);
    let failure = run.halt.as_ref().map(PlanFailure::from_halt);
    if let Some(f) = &failure {
        warnings.push(f.message.clone());
    }

    let (even_split_interest, interest_saved) = if input.compare_even_split && run.is_paid_off() {
        compare_with_even_split(&run, loans, input)?
    } else {
        (None, None)
    };

    let output = PaymentPlanOutput {
        report,
        schedule: run.schedule,
        failure,
        even_split_interest,
        interest_saved,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monthly linear-program allocation with simple monthly interest accrual",
        &serde_json::json!({
            "budget": input.budget.to_string(),
            "loans": input.loans.len(),
            "apr_unit": input.apr_unit,
            "strategy": input.config.strategy,
            "max_months": input.config.max_months,
            "interest_rounding": "cents, half away from zero",
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn compare_with_even_split(
    run: &SimulationRun,
    loans: LoanSet,
    input: &PaymentPlanInput,
) -> LoanOptimizerResult<(Option<Money>, Option<Money>)> {
    if input.config.strategy == AllocationStrategy::EvenSplit {
        return Ok((None, None));
    }
    let config = SimulationConfig {
        strategy: AllocationStrategy::EvenSplit,
        ..input.config.clone()
    };
    let baseline = simulate(loans, input.budget, config)?;
    if baseline.state != SimulationState::PaidOff {
        return Ok((None, None));
    }
    let baseline_interest = baseline.schedule.total_interest();
    let saved = (baseline_interest - run.schedule.total_interest()).max(Decimal::ZERO);
    Ok((Some(baseline_interest), Some(saved)))
}
