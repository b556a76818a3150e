use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The single current plan row for a given (owner_id, plan_type) pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivePlan {
    pub plan_id: Uuid,
    pub owner_id: String,
    pub plan_type: String,
    pub version: i64,
    pub summary: String,
    pub data: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// An immutable snapshot of a plan's content at a specific version.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanHistoryEntry {
    pub id: i64,
    pub plan_id: Uuid,
    pub version: i64,
    pub summary: String,
    pub data: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}
