pub mod allocate;
pub mod plan;
