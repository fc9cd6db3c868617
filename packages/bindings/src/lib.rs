use napi::Result as NapiResult;
use napi_derive::napi;

use loan_optimizer_core::export::ScheduleTable;
use loan_optimizer_core::optimizer::{allocator, plan};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Payment plans
// ---------------------------------------------------------------------------

#[napi]
pub fn optimize_payment_plan(input_json: String) -> NapiResult<String> {
    let input: plan::PaymentPlanInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = plan::optimize_payment_plan(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn allocate_month(input_json: String) -> NapiResult<String> {
    let input: allocator::AllocationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = allocator::allocate_month(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Run a plan and return only its amortisation table (`{headers, rows}`).
#[napi]
pub fn schedule_table(input_json: String) -> NapiResult<String> {
    let input: plan::PaymentPlanInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = plan::optimize_payment_plan(&input).map_err(to_napi_error)?;
    let table = ScheduleTable::from_schedule(&output.result.schedule, input.config.start_date);
    serde_json::to_string(&table).map_err(to_napi_error)
}
