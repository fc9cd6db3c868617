pub mod allocator;
pub mod plan;
pub mod report;
pub mod simulator;
