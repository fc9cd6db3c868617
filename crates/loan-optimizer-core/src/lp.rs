//! Dense simplex solver for small linear programs in `Decimal`.
//!
//! Solves `maximize c·x` subject to `A x <= b`, `x >= 0`, with every
//! `b_i >= 0`. A non-negative right-hand side makes the origin feasible,
//! so the slack basis is a valid starting point and a single phase
//! suffices. Pivoting follows Bland's rule: lowest-index entering column,
//! ties on the ratio test broken by lowest basic variable. This rules out
//! cycling and makes the result a deterministic function of the inputs.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LoanOptimizerError;
use crate::LoanOptimizerResult;

const PIVOT_EPSILON: Decimal = dec!(0.000000000001);
const MAX_PIVOTS: u32 = 10_000;

/// A single `coefficients · x <= bound` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub coefficients: Vec<Decimal>,
    pub bound: Decimal,
}

/// Linear program in canonical maximisation form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearProgram {
    pub objective: Vec<Decimal>,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpSolution {
    pub values: Vec<Decimal>,
    pub objective: Decimal,
    pub pivots: u32,
}

impl LinearProgram {
    pub fn new(objective: Vec<Decimal>) -> Self {
        Self {
            objective,
            constraints: Vec::new(),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    /// Add `coefficients · x <= bound`.
    pub fn add_constraint(&mut self, coefficients: Vec<Decimal>, bound: Decimal) -> &mut Self {
        self.constraints.push(Constraint {
            coefficients,
            bound,
        });
        self
    }

    /// Add `x_var <= bound`.
    pub fn add_upper_bound(&mut self, var: usize, bound: Decimal) -> &mut Self {
        let mut coefficients = vec![Decimal::ZERO; self.num_vars()];
        if let Some(c) = coefficients.get_mut(var) {
            *c = Decimal::ONE;
        }
        self.add_constraint(coefficients, bound)
    }

    pub fn maximize(&self) -> LoanOptimizerResult<LpSolution> {
        let n = self.num_vars();
        let m = self.constraints.len();
        let width = n + m;

        for (i, c) in self.constraints.iter().enumerate() {
            if c.coefficients.len() != n {
                return Err(LoanOptimizerError::SolverFailure {
                    reason: format!(
                        "constraint {i} has {} coefficients, expected {n}",
                        c.coefficients.len()
                    ),
                });
            }
            if c.bound < Decimal::ZERO {
                return Err(LoanOptimizerError::SolverFailure {
                    reason: format!("constraint {i} has negative bound {}", c.bound),
                });
            }
        }

        // rows[i] = [a_i0 .. a_i(n-1), slack_0 .. slack_(m-1), rhs]
        let mut rows: Vec<Vec<Decimal>> = self
            .constraints
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let mut row = Vec::with_capacity(width + 1);
                row.extend_from_slice(&c.coefficients);
                row.extend((0..m).map(|k| if k == i { Decimal::ONE } else { Decimal::ZERO }));
                row.push(c.bound);
                row
            })
            .collect();

        // Reduced-cost row: -c for structural columns, objective value last.
        let mut cost: Vec<Decimal> = self.objective.iter().map(|c| -*c).collect();
        cost.extend(std::iter::repeat(Decimal::ZERO).take(m + 1));

        let mut basis: Vec<usize> = (n..width).collect();
        let mut pivots = 0u32;

        loop {
            let Some(entering) = (0..width).find(|&j| cost[j] < -PIVOT_EPSILON) else {
                break;
            };

            let mut leaving: Option<(usize, Decimal)> = None;
            for (i, row) in rows.iter().enumerate() {
                let a = row[entering];
                if a <= PIVOT_EPSILON {
                    continue;
                }
                let ratio = row[width] / a;
                leaving = match leaving {
                    None => Some((i, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio
                            || (ratio == best_ratio && basis[i] < basis[best])
                        {
                            Some((i, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }

            let Some((pivot_row, _)) = leaving else {
                return Err(LoanOptimizerError::SolverFailure {
                    reason: format!("objective unbounded along column {entering}"),
                });
            };

            pivots += 1;
            if pivots > MAX_PIVOTS {
                return Err(LoanOptimizerError::SolverFailure {
                    reason: format!("no optimum after {MAX_PIVOTS} pivots"),
                });
            }

            pivot(&mut rows, &mut cost, pivot_row, entering);
            basis[pivot_row] = entering;
        }

        let mut values = vec![Decimal::ZERO; n];
        for (i, &var) in basis.iter().enumerate() {
            if var < n {
                values[var] = rows[i][width];
            }
        }

        Ok(LpSolution {
            values,
            objective: cost[width],
            pivots,
        })
    }
}

fn pivot(rows: &mut [Vec<Decimal>], cost: &mut [Decimal], pivot_row: usize, col: usize) {
    let p = rows[pivot_row][col];
    for v in rows[pivot_row].iter_mut() {
        *v /= p;
    }
    let normalised = rows[pivot_row].clone();

    for (i, row) in rows.iter_mut().enumerate() {
        if i == pivot_row {
            continue;
        }
        let factor = row[col];
        if factor.is_zero() {
            continue;
        }
        for (v, pv) in row.iter_mut().zip(&normalised) {
            *v -= factor * pv;
        }
    }

    let factor = cost[col];
    if !factor.is_zero() {
        for (v, pv) in cost.iter_mut().zip(&normalised) {
            *v -= factor * pv;
        }
    }
}
