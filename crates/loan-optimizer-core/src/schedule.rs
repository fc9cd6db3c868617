use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{LoanId, Money};

/// One simulated month. Immutable once appended to a [`Schedule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRecord {
    /// 1-based month index.
    pub month_index: u32,
    pub opening_balances: BTreeMap<LoanId, Money>,
    pub payments: BTreeMap<LoanId, Money>,
    pub interest_accrued: BTreeMap<LoanId, Money>,
    pub ending_balances: BTreeMap<LoanId, Money>,
    /// Loans in interest deferment during this month.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub deferred: BTreeSet<LoanId>,
    pub total_payment: Money,
    pub total_interest: Money,
}

impl MonthRecord {
    pub fn total_ending_balance(&self) -> Money {
        self.ending_balances.values().copied().sum()
    }

    pub fn total_opening_balance(&self) -> Money {
        self.opening_balances.values().copied().sum()
    }

    pub fn is_paid_off(&self) -> bool {
        self.ending_balances.values().all(|b| b.is_zero())
    }
}

/// Append-only, month-ordered amortisation schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    records: Vec<MonthRecord>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next month. Records must arrive in month order.
    pub(crate) fn push(&mut self, record: MonthRecord) {
        debug_assert_eq!(record.month_index as usize, self.records.len() + 1);
        self.records.push(record);
    }

    pub fn records(&self) -> &[MonthRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&MonthRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MonthRecord> {
        self.records.iter()
    }

    /// Loan ids present in the schedule, in id order.
    pub fn loan_ids(&self) -> Vec<LoanId> {
        self.records
            .first()
            .map(|r| r.opening_balances.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn total_interest(&self) -> Money {
        self.records.iter().map(|r| r.total_interest).sum()
    }

    pub fn total_paid(&self) -> Money {
        self.records.iter().map(|r| r.total_payment).sum()
    }

    /// Month index of the first record where every balance is zero.
    pub fn payoff_month(&self) -> Option<u32> {
        self.records
            .iter()
            .find(|r| r.is_paid_off())
            .map(|r| r.month_index)
    }

    /// Balance outstanding after the last simulated month.
    pub fn remaining_balance(&self) -> Decimal {
        self.records
            .last()
            .map(|r| r.total_ending_balance())
            .unwrap_or(Decimal::ZERO)
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a MonthRecord;
    type IntoIter = std::slice::Iter<'a, MonthRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
