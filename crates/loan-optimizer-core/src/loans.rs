use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LoanOptimizerError;
use crate::types::*;
use crate::LoanOptimizerResult;

/// Maximum number of concurrent loans in one plan.
pub const MAX_LOANS: usize = 10;

/// Longest interest deferment accepted on input.
pub const MAX_DEFERMENT_MONTHS: u32 = 240;

/// Largest balance, minimum payment or budget accepted. Keeps every sum
/// and interest product well inside `Decimal` range.
pub const MAX_AMOUNT: Money = dec!(1_000_000_000_000);

/// Smallest budget accepted: payments are made in whole cents.
pub const MIN_BUDGET: Money = dec!(0.01);

/// How APRs are expressed on input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AprUnit {
    /// 0.05 = 5%
    #[default]
    Fraction,
    /// 5 = 5%
    Percent,
}

/// A loan as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub balance: Money,
    pub apr: Rate,
    #[serde(default)]
    pub min_payment: Money,
    /// Months from the start of the plan during which no interest accrues
    /// and no minimum payment is required.
    #[serde(default)]
    pub deferment_months: u32,
}

/// Live state of a single loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub name: String,
    pub balance: Money,
    /// Annual rate as a fraction.
    pub apr: Rate,
    pub min_payment: Money,
    pub deferment_months_remaining: u32,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.balance > Decimal::ZERO
    }

    pub fn in_deferment(&self) -> bool {
        self.deferment_months_remaining > 0
    }

    /// Interest accruing this month on the opening balance.
    pub fn monthly_interest(&self) -> Money {
        if !self.is_active() || self.in_deferment() {
            return Decimal::ZERO;
        }
        round_cents(self.balance * self.apr / MONTHS_PER_YEAR)
    }

    /// Amount that retires the loan this month: balance plus this month's interest.
    pub fn payoff_amount(&self) -> Money {
        self.balance + self.monthly_interest()
    }

    /// Least payment the loan must receive this month.
    pub fn required_payment(&self) -> Money {
        if !self.is_active() || self.in_deferment() {
            return Decimal::ZERO;
        }
        self.min_payment.min(self.payoff_amount())
    }
}

/// Snapshot of every loan at the start of a simulated month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSet {
    /// 1-based month this snapshot opens.
    pub month: u32,
    pub loans: Vec<Loan>,
}

impl LoanSet {
    /// Validate inputs and assign ids 1..N in input order.
    pub fn from_inputs(inputs: &[LoanInput], unit: AprUnit) -> LoanOptimizerResult<Self> {
        if inputs.is_empty() {
            return Err(LoanOptimizerError::invalid(
                "loans",
                "At least one loan is required",
            ));
        }
        if inputs.len() > MAX_LOANS {
            return Err(LoanOptimizerError::invalid(
                "loans",
                format!("At most {MAX_LOANS} loans are supported, got {}", inputs.len()),
            ));
        }

        let mut loans = Vec::with_capacity(inputs.len());
        for (idx, input) in inputs.iter().enumerate() {
            let id = (idx + 1) as LoanId;
            let apr = match unit {
                AprUnit::Fraction => input.apr,
                AprUnit::Percent => input.apr / dec!(100),
            };

            if input.balance <= Decimal::ZERO {
                return Err(LoanOptimizerError::invalid(
                    format!("loans[{idx}].balance"),
                    "Balance must be positive",
                ));
            }
            if apr < Decimal::ZERO || apr > Decimal::ONE {
                return Err(LoanOptimizerError::invalid(
                    format!("loans[{idx}].apr"),
                    format!("APR must be between 0 and 1 (as a fraction), got {apr}"),
                ));
            }
            if input.balance > MAX_AMOUNT {
                return Err(LoanOptimizerError::invalid(
                    format!("loans[{idx}].balance"),
                    format!("Balance cannot exceed {MAX_AMOUNT}"),
                ));
            }
            if input.min_payment < Decimal::ZERO {
                return Err(LoanOptimizerError::invalid(
                    format!("loans[{idx}].min_payment"),
                    "Minimum payment cannot be negative",
                ));
            }
            if input.min_payment > MAX_AMOUNT {
                return Err(LoanOptimizerError::invalid(
                    format!("loans[{idx}].min_payment"),
                    format!("Minimum payment cannot exceed {MAX_AMOUNT}"),
                ));
            }
            if input.deferment_months > MAX_DEFERMENT_MONTHS {
                return Err(LoanOptimizerError::invalid(
                    format!("loans[{idx}].deferment_months"),
                    format!("Deferment cannot exceed {MAX_DEFERMENT_MONTHS} months"),
                ));
            }

            loans.push(Loan {
                id,
                name: input.name.clone().unwrap_or_else(|| format!("Loan {id}")),
                balance: input.balance,
                apr,
                min_payment: input.min_payment,
                deferment_months_remaining: input.deferment_months,
            });
        }

        Ok(LoanSet { month: 1, loans })
    }

    pub fn active(&self) -> impl Iterator<Item = &Loan> {
        self.loans.iter().filter(|l| l.is_active())
    }

    pub fn total_balance(&self) -> Money {
        self.loans.iter().map(|l| l.balance).sum()
    }

    pub fn is_paid_off(&self) -> bool {
        self.loans.iter().all(|l| !l.is_active())
    }

    pub fn any_deferred(&self) -> bool {
        self.active().any(|l| l.in_deferment())
    }

    /// Sum of required payments across active, non-deferred loans.
    pub fn required_minimums(&self) -> Money {
        self.active().map(|l| l.required_payment()).sum()
    }

    /// Interest that accrues this month across all loans.
    pub fn total_monthly_interest(&self) -> Money {
        self.active().map(|l| l.monthly_interest()).sum()
    }
}

/// Budget must be at least one cent and no more than [`MAX_AMOUNT`].
pub fn validate_budget(budget: Money) -> LoanOptimizerResult<()> {
    if budget <= Decimal::ZERO {
        return Err(LoanOptimizerError::invalid(
            "budget",
            "Monthly budget must be positive",
        ));
    }
    if budget < MIN_BUDGET {
        return Err(LoanOptimizerError::invalid(
            "budget",
            format!("Monthly budget must be at least {MIN_BUDGET}"),
        ));
    }
    if budget > MAX_AMOUNT {
        return Err(LoanOptimizerError::invalid(
            "budget",
            format!("Monthly budget cannot exceed {MAX_AMOUNT}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(balance: Decimal, apr: Decimal, min: Decimal) -> LoanInput {
        LoanInput {
            name: None,
            balance,
            apr,
            min_payment: min,
            deferment_months: 0,
        }
    }

    #[test]
    fn test_ids_assigned_in_order() {
        let set = LoanSet::from_inputs(
            &[input(dec!(100), dec!(0.1), dec!(10)), input(dec!(200), dec!(0.2), dec!(20))],
            AprUnit::Fraction,
        )
        .unwrap();
        assert_eq!(set.month, 1);
        assert_eq!(set.loans[0].id, 1);
        assert_eq!(set.loans[1].id, 2);
        assert_eq!(set.loans[1].name, "Loan 2");
        assert_eq!(set.total_balance(), dec!(300));
    }

    #[test]
    fn test_percent_apr_normalised() {
        let set =
            LoanSet::from_inputs(&[input(dec!(100), dec!(6.5), dec!(0))], AprUnit::Percent).unwrap();
        assert_eq!(set.loans[0].apr, dec!(0.065));
    }

    #[test]
    fn test_rejects_too_many_loans() {
        let loans = vec![input(dec!(100), dec!(0.1), dec!(1)); MAX_LOANS + 1];
        let err = LoanSet::from_inputs(&loans, AprUnit::Fraction).unwrap_err();
        assert!(matches!(err, LoanOptimizerError::InvalidInput { ref field, .. } if field == "loans"));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(LoanSet::from_inputs(&[], AprUnit::Fraction).is_err());
    }

    #[test]
    fn test_rejects_bad_fields() {
        assert!(LoanSet::from_inputs(&[input(dec!(-1), dec!(0.1), dec!(1))], AprUnit::Fraction).is_err());
        assert!(LoanSet::from_inputs(&[input(dec!(0), dec!(0.1), dec!(1))], AprUnit::Fraction).is_err());
        assert!(LoanSet::from_inputs(&[input(dec!(100), dec!(1.5), dec!(1))], AprUnit::Fraction).is_err());
        assert!(LoanSet::from_inputs(&[input(dec!(100), dec!(-0.1), dec!(1))], AprUnit::Fraction).is_err());
        assert!(LoanSet::from_inputs(&[input(dec!(100), dec!(0.1), dec!(-1))], AprUnit::Fraction).is_err());
    }

    #[test]
    fn test_rejects_long_deferment() {
        let mut loan = input(dec!(100), dec!(0.1), dec!(1));
        loan.deferment_months = MAX_DEFERMENT_MONTHS + 1;
        assert!(LoanSet::from_inputs(&[loan], AprUnit::Fraction).is_err());
    }

    #[test]
    fn test_budget_must_be_positive() {
        assert!(validate_budget(dec!(0)).is_err());
        assert!(validate_budget(dec!(-5)).is_err());
        assert!(validate_budget(dec!(1)).is_ok());
    }

    #[test]
    fn test_rejects_amounts_beyond_ceiling() {
        let err = LoanSet::from_inputs(&[input(Decimal::MAX, dec!(1), dec!(100))], AprUnit::Fraction)
            .unwrap_err();
        assert!(matches!(err, LoanOptimizerError::InvalidInput { ref field, .. } if field == "loans[0].balance"));

        let err = LoanSet::from_inputs(
            &[input(dec!(100), dec!(0.1), MAX_AMOUNT + Decimal::ONE)],
            AprUnit::Fraction,
        )
        .unwrap_err();
        assert!(matches!(err, LoanOptimizerError::InvalidInput { ref field, .. } if field == "loans[0].min_payment"));

        assert!(validate_budget(Decimal::MAX).is_err());
        // Ceiling itself is accepted and its interest stays in range.
        let set = LoanSet::from_inputs(&[input(MAX_AMOUNT, dec!(1), MAX_AMOUNT)], AprUnit::Fraction).unwrap();
        assert!(set.loans[0].payoff_amount() > MAX_AMOUNT);
        assert!(validate_budget(MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_rejects_sub_cent_budget() {
        assert!(validate_budget(dec!(0.004)).is_err());
        assert!(validate_budget(MIN_BUDGET).is_ok());
    }

    #[test]
    fn test_required_payment_capped_at_payoff() {
        let loan = Loan {
            id: 1,
            name: "Card".into(),
            balance: dec!(30),
            apr: dec!(0.12),
            min_payment: dec!(50),
            deferment_months_remaining: 0,
        };
        // 30 + 0.30 interest
        assert_eq!(loan.monthly_interest(), dec!(0.30));
        assert_eq!(loan.required_payment(), dec!(30.30));
    }

    #[test]
    fn test_deferred_loan_has_no_interest_or_minimum() {
        let loan = Loan {
            id: 1,
            name: "Student".into(),
            balance: dec!(5000),
            apr: dec!(0.06),
            min_payment: dec!(50),
            deferment_months_remaining: 3,
        };
        assert_eq!(loan.monthly_interest(), Decimal::ZERO);
        assert_eq!(loan.required_payment(), Decimal::ZERO);
        assert_eq!(loan.payoff_amount(), dec!(5000));
    }
}
