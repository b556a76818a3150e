//! Plan operation dispatcher.
//!
//! Stateless: every invocation validates its payload, runs the storage
//! calls for one operation, and produces a JSON response or a typed
//! [`error::OpError`]. All durable state lives in the `active_plans` and
//! `plan_history` tables behind an injected [`sqlx::PgPool`].

pub mod dispatch;
pub mod error;
pub mod request;
