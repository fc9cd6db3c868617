pub mod error;
pub mod loans;
pub mod lp;
pub mod schedule;
pub mod types;

#[cfg(feature = "optimizer")]
pub mod optimizer;

#[cfg(feature = "export")]
pub mod export;

pub use error::LoanOptimizerError;
pub use types::*;

/// Standard result type for all loan-optimizer operations
pub type LoanOptimizerResult<T> = Result<T, LoanOptimizerError>;
