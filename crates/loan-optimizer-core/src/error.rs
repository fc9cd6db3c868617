use rust_decimal::Decimal;
use thiserror::Error;

use crate::schedule::Schedule;
use crate::types::Money;

#[derive(Debug, Error)]
pub enum LoanOptimizerError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error(
        "Infeasible budget in month {month}: minimum payments require {required} but budget is {budget} (shortfall {shortfall})"
    )]
    InfeasibleBudget {
        month: u32,
        required: Money,
        budget: Money,
        shortfall: Money,
        /// Records completed before the infeasible month.
        partial: Box<Schedule>,
    },

    #[error(
        "Stalled simulation: loans not paid off after {months} months (remaining balance {remaining_balance})"
    )]
    StalledSimulation {
        months: u32,
        remaining_balance: Decimal,
        partial: Box<Schedule>,
    },

    #[error("Solver failure: {reason}")]
    SolverFailure { reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LoanOptimizerError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        LoanOptimizerError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The schedule simulated up to the failure, for terminal simulation errors.
    pub fn partial_schedule(&self) -> Option<&Schedule> {
        match self {
            LoanOptimizerError::InfeasibleBudget { partial, .. }
            | LoanOptimizerError::StalledSimulation { partial, .. } => Some(partial.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LoanOptimizerError {
    fn from(e: serde_json::Error) -> Self {
        LoanOptimizerError::SerializationError(e.to_string())
    }
}
