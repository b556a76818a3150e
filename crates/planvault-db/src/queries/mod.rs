//! Query functions, one module per table.

pub mod active_plans;
pub mod history;
