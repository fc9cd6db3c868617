use std::collections::BTreeMap;
use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::LoanOptimizerError;
use crate::loans::{validate_budget, AprUnit, Loan, LoanInput, LoanSet};
use crate::lp::LinearProgram;
use crate::types::*;
use crate::LoanOptimizerResult;

/// Small per-dollar credit for retiring principal. Keeps surplus budget
/// flowing when every active loan has an effective rate of zero, and ranks
/// those loans by the APR they resume at.
pub const PRINCIPAL_PREFERENCE: Decimal = dec!(0.000001);

/// How surplus budget (beyond required payments) is distributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Linear program minimising next month's rate-weighted balance.
    #[default]
    InterestMinimizing,
    /// Equal share of the surplus per active loan, capped at payoff.
    EvenSplit,
}

/// One month's payment per loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub month: u32,
    pub payments: BTreeMap<LoanId, Money>,
    pub total: Money,
    /// Budget not needed this month (all loans capped at payoff).
    pub unallocated: Money,
}

impl Allocation {
    pub fn payment(&self, id: LoanId) -> Money {
        self.payments.get(&id).copied().unwrap_or(Decimal::ZERO)
    }
}

/// Solves the single-month allocation problem for a [`LoanSet`].
#[derive(Debug, Clone, Copy)]
pub struct MonthlyAllocator {
    budget: Money,
    strategy: AllocationStrategy,
}

impl MonthlyAllocator {
    pub fn new(budget: Money, strategy: AllocationStrategy) -> Self {
        Self { budget, strategy }
    }

    pub fn budget(&self) -> Money {
        self.budget
    }

    /// Allocate the budget for the month opened by `set`.
    ///
    /// Every active loan not in deferment receives at least
    /// `min(min_payment, balance + interest)`. No loan receives more than its
    /// payoff amount, and the total never exceeds the budget. Fails with
    /// `InfeasibleBudget` when the required payments alone exceed the budget.
    pub fn allocate(&self, set: &LoanSet) -> LoanOptimizerResult<Allocation> {
        let active: Vec<&Loan> = set.active().collect();
        let floors: Vec<Money> = active.iter().map(|l| l.required_payment()).collect();
        let caps: Vec<Money> = active.iter().map(|l| l.payoff_amount()).collect();

        let required = set.required_minimums();
        if required > self.budget {
            let shortfall = required - self.budget;
            return Err(LoanOptimizerError::InfeasibleBudget {
                month: set.month,
                required,
                budget: self.budget,
                shortfall,
                partial: Box::default(),
            });
        }

        let surplus = self.budget - required;
        let headroom: Vec<Money> = floors.iter().zip(&caps).map(|(f, c)| *c - *f).collect();

        let extra = match self.strategy {
            AllocationStrategy::InterestMinimizing => {
                solve_interest_minimizing(&active, &headroom, surplus)?
            }
            AllocationStrategy::EvenSplit => even_split(&headroom, surplus),
        };

        let mut payments = BTreeMap::new();
        for loan in &set.loans {
            payments.insert(loan.id, Decimal::ZERO);
        }
        let mut total = Decimal::ZERO;
        for (i, loan) in active.iter().enumerate() {
            // Truncate to cents so the total never exceeds the budget.
            let payment = (floors[i] + extra[i].trunc_with_scale(2)).min(caps[i]);
            total += payment;
            payments.insert(loan.id, payment);
        }

        debug!(
            month = set.month,
            budget = %self.budget,
            required = %required,
            total = %total,
            strategy = ?self.strategy,
            "allocated monthly budget"
        );

        Ok(Allocation {
            month: set.month,
            payments,
            total,
            unallocated: self.budget - total,
        })
    }
}

/// Objective weight per dollar of extra payment on `loan` this month.
pub fn marginal_benefit(loan: &Loan) -> Rate {
    let effective = if loan.in_deferment() {
        Decimal::ZERO
    } else {
        monthly_rate(loan.apr)
    };
    effective + PRINCIPAL_PREFERENCE * (Decimal::ONE + loan.apr)
}

fn solve_interest_minimizing(
    active: &[&Loan],
    headroom: &[Money],
    surplus: Money,
) -> LoanOptimizerResult<Vec<Money>> {
    if active.is_empty() {
        return Ok(Vec::new());
    }

    // Variables are the extra payment above each loan's floor.
    let mut lp = LinearProgram::new(active.iter().map(|l| marginal_benefit(l)).collect());
    for (i, h) in headroom.iter().enumerate() {
        lp.add_upper_bound(i, *h);
    }
    lp.add_constraint(vec![Decimal::ONE; active.len()], surplus);

    let solution = lp.maximize()?;
    trace!(pivots = solution.pivots, "allocation LP solved");

    Ok(solution
        .values
        .into_iter()
        .map(|v| v.max(Decimal::ZERO))
        .collect())
}

/// Spread `surplus` evenly, re-spreading whatever capped loans cannot take.
fn even_split(headroom: &[Money], surplus: Money) -> Vec<Money> {
    let mut extra = vec![Decimal::ZERO; headroom.len()];
    let mut remaining = surplus;

    loop {
        let open: Vec<usize> = (0..headroom.len())
            .filter(|&i| headroom[i] - extra[i] > Decimal::ZERO)
            .collect();
        if open.is_empty() || remaining <= dec!(0.005) {
            break;
        }
        let share = remaining / Decimal::from(open.len() as u64);
        let mut handed_out = Decimal::ZERO;
        for i in open {
            let take = share.min(headroom[i] - extra[i]);
            extra[i] += take;
            handed_out += take;
        }
        remaining -= handed_out;
        if handed_out.is_zero() {
            break;
        }
    }

    extra
}

/// Input for a single-month allocation solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationInput {
    pub budget: Money,
    pub loans: Vec<LoanInput>,
    #[serde(default)]
    pub apr_unit: AprUnit,
    #[serde(default)]
    pub strategy: AllocationStrategy,
}

/// Solve the first month of a plan and report the per-loan payments.
pub fn allocate_month(
    input: &AllocationInput,
) -> LoanOptimizerResult<ComputationOutput<Allocation>> {
    let start = Instant::now();
    validate_budget(input.budget)?;
    let set = LoanSet::from_inputs(&input.loans, input.apr_unit)?;

    let allocation = MonthlyAllocator::new(input.budget, input.strategy).allocate(&set)?;

    let mut warnings = Vec::new();
    if allocation.unallocated > Decimal::ZERO {
        warnings.push(format!(
            "{} of the budget is not needed: every loan is paid off this month",
            allocation.unallocated
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Single-month interest-minimising allocation (linear program)",
        &serde_json::json!({
            "budget": input.budget.to_string(),
            "loans": input.loans.len(),
            "strategy": input.strategy,
        }),
        warnings,
        elapsed,
        allocation,
    ))
}
