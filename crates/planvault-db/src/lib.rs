//! PostgreSQL access layer for planvault.
//!
//! Holds the connection pool, embedded migrations, row models, and the
//! query functions for the `active_plans` and `plan_history` tables.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
