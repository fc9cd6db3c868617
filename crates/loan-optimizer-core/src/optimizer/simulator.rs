use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::allocator::{AllocationStrategy, MonthlyAllocator};
use crate::error::LoanOptimizerError;
use crate::loans::{validate_budget, LoanSet};
use crate::schedule::{MonthRecord, Schedule};
use crate::types::*;
use crate::LoanOptimizerResult;

/// Fifty years.
pub const DEFAULT_MAX_MONTHS: u32 = 600;

/// Consecutive non-deferred months without a balance decrease before a run
/// is declared stalled.
pub const DEFAULT_STALL_WINDOW: u32 = 24;

/// Tunables for an amortisation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Hard ceiling on simulated months.
    #[serde(default = "default_max_months")]
    pub max_months: u32,
    /// Early stall detection; `None` relies on `max_months` alone.
    #[serde(default = "default_stall_window")]
    pub stall_window: Option<u32>,
    #[serde(default)]
    pub strategy: AllocationStrategy,
    /// Calendar month of the first simulated month (day is ignored).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

fn default_max_months() -> u32 {
    DEFAULT_MAX_MONTHS
}

fn default_stall_window() -> Option<u32> {
    Some(DEFAULT_STALL_WINDOW)
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_months: DEFAULT_MAX_MONTHS,
            stall_window: Some(DEFAULT_STALL_WINDOW),
            strategy: AllocationStrategy::default(),
            start_date: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationState {
    Running,
    /// Every balance reached zero.
    PaidOff,
    /// Month ceiling hit, or balances stopped decreasing.
    Stalled,
    /// Required minimum payments exceeded the budget.
    BudgetInfeasible,
}

impl SimulationState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SimulationState::Running)
    }
}

/// Why a run ended in a failure state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    InfeasibleBudget {
        month: u32,
        required: Money,
        budget: Money,
        shortfall: Money,
    },
    MonthCeiling {
        months: u32,
        remaining_balance: Money,
    },
    NoProgress {
        months: u32,
        window: u32,
        remaining_balance: Money,
    },
}

/// A finished run: terminal state plus every month simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    pub state: SimulationState,
    pub budget: Money,
    pub config: SimulationConfig,
    pub schedule: Schedule,
    /// Loan names by id, for reporting.
    pub loan_names: BTreeMap<LoanId, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halt: Option<HaltReason>,
}

impl SimulationRun {
    pub fn is_paid_off(&self) -> bool {
        self.state == SimulationState::PaidOff
    }

    /// The schedule on success; the matching terminal error otherwise.
    pub fn into_result(self) -> LoanOptimizerResult<Schedule> {
        match self.halt {
            None => Ok(self.schedule),
            Some(HaltReason::InfeasibleBudget {
                month,
                required,
                budget,
                shortfall,
            }) => Err(LoanOptimizerError::InfeasibleBudget {
                month,
                required,
                budget,
                shortfall,
                partial: Box::new(self.schedule),
            }),
            Some(HaltReason::MonthCeiling {
                months,
                remaining_balance,
            })
            | Some(HaltReason::NoProgress {
                months,
                remaining_balance,
                ..
            }) => Err(LoanOptimizerError::StalledSimulation {
                months,
                remaining_balance,
                partial: Box::new(self.schedule),
            }),
        }
    }
}

/// Month-by-month amortisation driven by [`MonthlyAllocator`].
///
/// The simulator owns the evolving [`LoanSet`]; each step replaces it with
/// the next month's snapshot. Records are only ever appended.
#[derive(Debug, Clone)]
pub struct AmortizationSimulator {
    loans: LoanSet,
    allocator: MonthlyAllocator,
    config: SimulationConfig,
    schedule: Schedule,
    state: SimulationState,
    halt: Option<HaltReason>,
    months_without_progress: u32,
    loan_names: BTreeMap<LoanId, String>,
}

impl AmortizationSimulator {
    pub fn new(
        loans: LoanSet,
        budget: Money,
        config: SimulationConfig,
    ) -> LoanOptimizerResult<Self> {
        validate_budget(budget)?;
        if config.max_months == 0 {
            return Err(LoanOptimizerError::invalid(
                "config.max_months",
                "Month ceiling must be at least 1",
            ));
        }
        if config.stall_window == Some(0) {
            return Err(LoanOptimizerError::invalid(
                "config.stall_window",
                "Stall window must be at least 1 month",
            ));
        }

        let loan_names = loans.loans.iter().map(|l| (l.id, l.name.clone())).collect();
        Ok(Self {
            allocator: MonthlyAllocator::new(budget, config.strategy),
            loans,
            config,
            schedule: Schedule::new(),
            state: SimulationState::Running,
            halt: None,
            months_without_progress: 0,
            loan_names,
        })
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn loans(&self) -> &LoanSet {
        &self.loans
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Advance one month and return the resulting state.
    ///
    /// Terminal states are sticky: stepping a finished simulator is a no-op.
    pub fn step(&mut self) -> LoanOptimizerResult<SimulationState> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        if self.loans.is_paid_off() {
            return Ok(self.finish(SimulationState::PaidOff, None));
        }

        let month = self.loans.month;
        if month > self.config.max_months {
            let remaining_balance = self.loans.total_balance();
            return Ok(self.finish(
                SimulationState::Stalled,
                Some(HaltReason::MonthCeiling {
                    months: self.config.max_months,
                    remaining_balance,
                }),
            ));
        }

        let allocation = match self.allocator.allocate(&self.loans) {
            Ok(a) => a,
            Err(LoanOptimizerError::InfeasibleBudget {
                month,
                required,
                budget,
                shortfall,
                ..
            }) => {
                return Ok(self.finish(
                    SimulationState::BudgetInfeasible,
                    Some(HaltReason::InfeasibleBudget {
                        month,
                        required,
                        budget,
                        shortfall,
                    }),
                ));
            }
            Err(e) => return Err(e),
        };

        let any_deferred = self.loans.any_deferred();
        let mut record = MonthRecord {
            month_index: month,
            opening_balances: BTreeMap::new(),
            payments: BTreeMap::new(),
            interest_accrued: BTreeMap::new(),
            ending_balances: BTreeMap::new(),
            deferred: BTreeSet::new(),
            total_payment: Decimal::ZERO,
            total_interest: Decimal::ZERO,
        };

        let mut next = self.loans.clone();
        next.month = month + 1;
        for loan in next.loans.iter_mut() {
            let interest = loan.monthly_interest();
            let payment = allocation.payment(loan.id);
            let ending = (loan.balance + interest - payment).max(Decimal::ZERO);

            if loan.is_active() && loan.in_deferment() {
                record.deferred.insert(loan.id);
            }
            record.opening_balances.insert(loan.id, loan.balance);
            record.payments.insert(loan.id, payment);
            record.interest_accrued.insert(loan.id, interest);
            record.ending_balances.insert(loan.id, ending);
            record.total_payment += payment;
            record.total_interest += interest;

            loan.balance = ending;
            if loan.deferment_months_remaining > 0 {
                loan.deferment_months_remaining -= 1;
            }
        }

        debug!(
            month,
            paid = %record.total_payment,
            interest = %record.total_interest,
            remaining = %record.total_ending_balance(),
            "simulated month"
        );

        let progressed = record.total_ending_balance() < record.total_opening_balance();
        self.schedule.push(record);
        self.loans = next;

        if self.loans.is_paid_off() {
            return Ok(self.finish(SimulationState::PaidOff, None));
        }

        if progressed || any_deferred {
            self.months_without_progress = 0;
        } else {
            self.months_without_progress += 1;
        }
        if let Some(window) = self.config.stall_window {
            if self.months_without_progress >= window {
                let remaining_balance = self.loans.total_balance();
                return Ok(self.finish(
                    SimulationState::Stalled,
                    Some(HaltReason::NoProgress {
                        months: month,
                        window,
                        remaining_balance,
                    }),
                ));
            }
        }

        Ok(self.state)
    }

    /// Step until a terminal state is reached.
    pub fn run(mut self) -> LoanOptimizerResult<SimulationRun> {
        while !self.step()?.is_terminal() {}
        Ok(SimulationRun {
            state: self.state,
            budget: self.allocator.budget(),
            config: self.config,
            schedule: self.schedule,
            loan_names: self.loan_names,
            halt: self.halt,
        })
    }

    fn finish(&mut self, state: SimulationState, halt: Option<HaltReason>) -> SimulationState {
        match &halt {
            None => info!(
                months = self.schedule.len(),
                total_interest = %self.schedule.total_interest(),
                "all loans paid off"
            ),
            Some(HaltReason::InfeasibleBudget { month, shortfall, .. }) => warn!(
                month,
                shortfall = %shortfall,
                "budget cannot cover required minimum payments"
            ),
            Some(reason) => warn!(?reason, "simulation stalled"),
        }
        self.state = state;
        self.halt = halt;
        state
    }
}

/// Run a simulation over `loans` to a terminal state.
pub fn simulate(
    loans: LoanSet,
    budget: Money,
    config: SimulationConfig,
) -> LoanOptimizerResult<SimulationRun> {
    AmortizationSimulator::new(loans, budget, config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loans::{AprUnit, LoanInput};
    use rust_decimal_macros::dec;

    fn loans(specs: &[(Decimal, Decimal, Decimal, u32)]) -> LoanSet {
        let inputs: Vec<LoanInput> = specs
            .iter()
            .map(|&(balance, apr, min_payment, deferment_months)| LoanInput {
                name: None,
                balance,
                apr,
                min_payment,
                deferment_months,
            })
            .collect();
        LoanSet::from_inputs(&inputs, AprUnit::Fraction).unwrap()
    }

    #[test]
    fn test_zero_rate_loan_pays_off_exactly() {
        let set = loans(&[(dec!(1000), dec!(0), dec!(100), 0)]);
        let run = simulate(set, dec!(100), SimulationConfig::default()).unwrap();
        assert_eq!(run.state, SimulationState::PaidOff);
        assert_eq!(run.schedule.len(), 10);
        assert_eq!(run.schedule.total_interest(), Decimal::ZERO);
        assert_eq!(run.schedule.payoff_month(), Some(10));
    }

    #[test]
    fn test_first_month_interest_and_balance() {
        let set = loans(&[(dec!(1200), dec!(0.12), dec!(100), 0)]);
        let run = simulate(set, dec!(100), SimulationConfig::default()).unwrap();
        let first = &run.schedule.records()[0];
        assert_eq!(first.interest_accrued[&1], dec!(12));
        assert_eq!(first.payments[&1], dec!(100));
        assert_eq!(first.ending_balances[&1], dec!(1112));
    }

    #[test]
    fn test_step_is_sticky_after_terminal() {
        let set = loans(&[(dec!(50), dec!(0), dec!(10), 0)]);
        let mut sim = AmortizationSimulator::new(set, dec!(100), SimulationConfig::default()).unwrap();
        assert_eq!(sim.step().unwrap(), SimulationState::PaidOff);
        assert_eq!(sim.schedule().len(), 1);
        assert_eq!(sim.step().unwrap(), SimulationState::PaidOff);
        assert_eq!(sim.schedule().len(), 1);
    }

    #[test]
    fn test_infeasible_halts_before_recording_month() {
        let set = loans(&[(dec!(1000), dec!(0.1), dec!(50), 0)]);
        let run = simulate(set, dec!(40), SimulationConfig::default()).unwrap();
        assert_eq!(run.state, SimulationState::BudgetInfeasible);
        assert!(run.schedule.is_empty());
        assert!(matches!(
            run.halt,
            Some(HaltReason::InfeasibleBudget { month: 1, .. })
        ));
    }

    #[test]
    fn test_stall_window_detects_interest_only_budget() {
        // 10000 at 12% accrues exactly 100 a month.
        let set = loans(&[(dec!(10000), dec!(0.12), dec!(0), 0)]);
        let config = SimulationConfig {
            stall_window: Some(6),
            ..Default::default()
        };
        let run = simulate(set, dec!(100), config).unwrap();
        assert_eq!(run.state, SimulationState::Stalled);
        assert_eq!(run.schedule.len(), 6);
        assert!(matches!(run.halt, Some(HaltReason::NoProgress { window: 6, .. })));
    }

    #[test]
    fn test_month_ceiling_stalls() {
        let set = loans(&[(dec!(10000), dec!(0), dec!(10), 0)]);
        let config = SimulationConfig {
            max_months: 12,
            ..Default::default()
        };
        let run = simulate(set, dec!(10), config).unwrap();
        assert_eq!(run.state, SimulationState::Stalled);
        assert_eq!(run.schedule.len(), 12);
        match run.into_result() {
            Err(LoanOptimizerError::StalledSimulation {
                months,
                remaining_balance,
                partial,
            }) => {
                assert_eq!(months, 12);
                assert_eq!(remaining_balance, dec!(9880));
                assert_eq!(partial.len(), 12);
            }
            other => panic!("expected stall, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_zero_ceiling() {
        let set = loans(&[(dec!(100), dec!(0), dec!(10), 0)]);
        let config = SimulationConfig {
            max_months: 0,
            ..Default::default()
        };
        assert!(AmortizationSimulator::new(set, dec!(10), config).is_err());
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: SimulationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
    }
}
