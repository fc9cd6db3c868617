use loan_optimizer_core::loans::{AprUnit, LoanInput, LoanSet};
use loan_optimizer_core::optimizer::allocator::AllocationStrategy;
use loan_optimizer_core::optimizer::report::ScheduleReport;
use loan_optimizer_core::optimizer::simulator::{
    simulate, AmortizationSimulator, SimulationConfig, SimulationState,
};
use loan_optimizer_core::LoanOptimizerError;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn loan(balance: Decimal, apr: Decimal, min_payment: Decimal, deferment_months: u32) -> LoanInput {
    LoanInput {
        name: None,
        balance,
        apr,
        min_payment,
        deferment_months,
    }
}

fn loan_set(inputs: &[LoanInput]) -> LoanSet {
    LoanSet::from_inputs(inputs, AprUnit::Fraction).unwrap()
}

// ===========================================================================
// Single amortising loan
// ===========================================================================

#[test]
fn test_single_loan_pays_off_with_final_partial_payment() {
    // 1200 at 12% with 100/month: 12 payments of 100 only cover principal,
    // so payoff lands in month 13 with a final partial payment.
    let set = loan_set(&[loan(dec!(1200), dec!(0.12), dec!(100), 0)]);
    let run = simulate(set, dec!(100), SimulationConfig::default()).unwrap();

    assert_eq!(run.state, SimulationState::PaidOff);
    assert_eq!(run.schedule.len(), 13);

    let last = run.schedule.last().unwrap();
    assert_eq!(last.month_index, 13);
    assert_eq!(last.ending_balances[&1], Decimal::ZERO);
    assert_eq!(last.payments[&1], dec!(84.78));

    let report = ScheduleReport::from_run(&run);
    assert!(report.total_interest > Decimal::ZERO);
    assert_eq!(report.total_interest, dec!(84.78));
    assert_eq!(report.payoff_month, Some(13));
    assert_eq!(report.months_remaining, Some(13));
}

#[test]
fn test_single_loan_every_full_month_pays_budget() {
    let set = loan_set(&[loan(dec!(1200), dec!(0.12), dec!(100), 0)]);
    let run = simulate(set, dec!(100), SimulationConfig::default()).unwrap();
    for record in &run.schedule.records()[..12] {
        assert_eq!(record.total_payment, dec!(100));
    }
}

// ===========================================================================
// Surplus follows the higher APR
// ===========================================================================

#[test]
fn test_surplus_directed_to_higher_apr_until_paid_off() {
    let inputs = [
        loan(dec!(1000), dec!(0.20), dec!(50), 0),
        loan(dec!(1000), dec!(0.05), dec!(50), 0),
    ];
    let run = simulate(loan_set(&inputs), dec!(150), SimulationConfig::default()).unwrap();
    assert_eq!(run.state, SimulationState::PaidOff);

    let high_apr_payoff = run
        .schedule
        .iter()
        .find(|r| r.ending_balances[&1].is_zero())
        .map(|r| r.month_index)
        .unwrap();
    assert_eq!(high_apr_payoff, 12);

    for record in run.schedule.iter().filter(|r| r.month_index < high_apr_payoff) {
        assert_eq!(record.payments[&1], dec!(100), "month {}", record.month_index);
        assert_eq!(record.payments[&2], dec!(50), "month {}", record.month_index);
    }
    // Once loan 1 retires, the whole budget moves to loan 2.
    for record in run.schedule.iter().filter(|r| r.month_index > high_apr_payoff) {
        assert_eq!(record.payments[&1], Decimal::ZERO);
    }
}

#[test]
fn test_optimal_beats_even_split() {
    let inputs = [
        loan(dec!(1000), dec!(0.20), dec!(50), 0),
        loan(dec!(1000), dec!(0.05), dec!(50), 0),
    ];
    let optimal = simulate(loan_set(&inputs), dec!(150), SimulationConfig::default()).unwrap();
    let even = simulate(
        loan_set(&inputs),
        dec!(150),
        SimulationConfig {
            strategy: AllocationStrategy::EvenSplit,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(even.state, SimulationState::PaidOff);
    assert_eq!(optimal.schedule.total_interest(), dec!(142.68));
    assert_eq!(even.schedule.total_interest(), dec!(170.86));
    assert!(optimal.schedule.total_interest() < even.schedule.total_interest());
}

// ===========================================================================
// Infeasible budget
// ===========================================================================

#[test]
fn test_budget_below_minimum_is_infeasible_in_month_one() {
    let set = loan_set(&[loan(dec!(1000), dec!(0.10), dec!(50), 0)]);
    let run = simulate(set, dec!(40), SimulationConfig::default()).unwrap();
    assert_eq!(run.state, SimulationState::BudgetInfeasible);

    match run.into_result() {
        Err(err @ LoanOptimizerError::InfeasibleBudget { .. }) => {
            assert!(err.partial_schedule().unwrap().is_empty());
            if let LoanOptimizerError::InfeasibleBudget {
                month, shortfall, ..
            } = err
            {
                assert_eq!(month, 1);
                assert_eq!(shortfall, dec!(10));
            }
        }
        other => panic!("expected infeasible budget, got {other:?}"),
    }
}

#[test]
fn test_infeasible_after_deferment_keeps_prior_months() {
    // Minimum only kicks in once the deferment ends.
    let set = loan_set(&[loan(dec!(5000), dec!(0.06), dec!(200), 3)]);
    let run = simulate(set, dec!(100), SimulationConfig::default()).unwrap();
    assert_eq!(run.state, SimulationState::BudgetInfeasible);
    assert_eq!(run.schedule.len(), 3);

    let err = run.into_result().unwrap_err();
    match &err {
        LoanOptimizerError::InfeasibleBudget { month, shortfall, .. } => {
            assert_eq!(*month, 4);
            assert_eq!(*shortfall, dec!(100));
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(err.partial_schedule().unwrap().len(), 3);
}

// ===========================================================================
// Interest deferment
// ===========================================================================

#[test]
fn test_deferment_suppresses_interest_then_resumes() {
    let set = loan_set(&[loan(dec!(5000), dec!(0.06), dec!(100), 6)]);
    let run = simulate(set, dec!(100), SimulationConfig::default()).unwrap();
    assert_eq!(run.state, SimulationState::PaidOff);

    let records = run.schedule.records();
    for record in &records[..6] {
        assert_eq!(record.interest_accrued[&1], Decimal::ZERO);
        assert!(record.deferred.contains(&1));
    }
    // 6 x 100 paid during deferment leaves 4400; 4400 * 0.06 / 12 = 22.
    assert_eq!(records[6].month_index, 7);
    assert_eq!(records[6].opening_balances[&1], dec!(4400));
    assert_eq!(records[6].interest_accrued[&1], dec!(22));
    assert!(records[6].deferred.is_empty());
}

#[test]
fn test_deferred_loan_receives_no_forced_minimum() {
    let inputs = [
        loan(dec!(3000), dec!(0.08), dec!(150), 6),
        loan(dec!(2000), dec!(0.18), dec!(60), 0),
    ];
    let config = SimulationConfig {
        stall_window: None,
        max_months: 6,
        ..Default::default()
    };
    let run = simulate(loan_set(&inputs), dec!(60), config).unwrap();
    for record in run.schedule.iter() {
        assert_eq!(record.payments[&1], Decimal::ZERO);
        assert_eq!(record.payments[&2], dec!(60));
    }
}

// ===========================================================================
// Stall detection
// ===========================================================================

#[test]
fn test_ceiling_stall_returns_partial_schedule() {
    let set = loan_set(&[loan(dec!(50000), dec!(0.10), dec!(0), 0)]);
    let config = SimulationConfig {
        max_months: 36,
        stall_window: None,
        ..Default::default()
    };
    // 50000 * 0.10 / 12 = 416.67 interest; 400 never catches up.
    let err = simulate(set, dec!(400), config).unwrap().into_result().unwrap_err();
    match err {
        LoanOptimizerError::StalledSimulation {
            months, partial, ..
        } => {
            assert_eq!(months, 36);
            assert_eq!(partial.len(), 36);
        }
        other => panic!("expected stall, got {other}"),
    }
}

#[test]
fn test_manual_stepping_matches_run() {
    let inputs = [
        loan(dec!(2500), dec!(0.15), dec!(40), 0),
        loan(dec!(800), dec!(0.07), dec!(25), 2),
    ];
    let mut sim =
        AmortizationSimulator::new(loan_set(&inputs), dec!(300), SimulationConfig::default()).unwrap();
    let mut steps = 0;
    while !sim.step().unwrap().is_terminal() {
        steps += 1;
        assert_eq!(sim.schedule().len(), steps);
        assert_eq!(sim.loans().month as usize, steps + 1);
    }
    let stepped = sim.schedule().clone();

    let run = simulate(loan_set(&inputs), dec!(300), SimulationConfig::default()).unwrap();
    assert_eq!(stepped, run.schedule);
}
