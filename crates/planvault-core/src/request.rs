//! Request and response types for the plan operation dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use planvault_db::models::{ActivePlan, PlanHistoryEntry};

use crate::error::OpError;

/// Maximum stored length of a plan summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 800;

/// Top-level request envelope: `{op, payload}`.
#[derive(Debug, Deserialize)]
pub struct OpRequest {
    pub op: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// Caller-supplied plan content for `start_plan` and the patch operations.
#[derive(Debug, Default, Deserialize)]
pub struct StateJson {
    pub version: Option<i64>,
    pub summary: Option<String>,
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct StartPlanPayload {
    pub owner_id: String,
    pub plan_type: String,
    pub state_json: StateJson,
}

#[derive(Debug, Deserialize)]
pub struct ActivePlanKeyPayload {
    pub owner_id: String,
    pub plan_type: String,
}

#[derive(Debug, Deserialize)]
pub struct PlanIdPayload {
    pub plan_id: Uuid,
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PatchActivePlanPayload {
    pub owner_id: String,
    pub plan_type: String,
    pub expected_version: i64,
    pub new_state_json: StateJson,
}

#[derive(Debug, Deserialize)]
pub struct PatchPlanPayload {
    pub plan_id: Uuid,
    pub owner_id: String,
    pub expected_version: i64,
    pub new_state_json: StateJson,
}

#[derive(Debug, Deserialize)]
pub struct RollbackPlanPayload {
    pub plan_id: Uuid,
    pub target_version: i64,
    pub owner_id: String,
}

/// The plan record returned by every successful plan operation.
///
/// Same as the stored row minus `owner_id`, which the caller already knows.
#[derive(Debug, Serialize)]
pub struct PlanRecord {
    pub plan_id: Uuid,
    pub plan_type: String,
    pub version: i64,
    pub summary: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

impl From<ActivePlan> for PlanRecord {
    fn from(plan: ActivePlan) -> Self {
        Self {
            plan_id: plan.plan_id,
            plan_type: plan.plan_type,
            version: plan.version,
            summary: plan.summary,
            data: plan.data,
            updated_at: plan.updated_at,
        }
    }
}

/// One entry in a `list_history` response.
#[derive(Debug, Serialize)]
pub struct HistoryRecord {
    pub version: i64,
    pub summary: String,
    pub data: Value,
    pub recorded_at: DateTime<Utc>,
}

impl From<PlanHistoryEntry> for HistoryRecord {
    fn from(entry: PlanHistoryEntry) -> Self {
        Self {
            version: entry.version,
            summary: entry.summary,
            data: entry.data,
            recorded_at: entry.recorded_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub plan_id: Uuid,
    pub entries: Vec<HistoryRecord>,
}

/// Deserialize an operation payload, turning any shape mismatch into a
/// validation error. Runs before any storage call.
pub fn parse_payload<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, OpError> {
    serde_json::from_value(payload.clone()).map_err(|e| OpError::Validation(e.to_string()))
}

/// Truncate a summary to [`SUMMARY_MAX_CHARS`] characters.
pub fn clamp_summary(summary: &str) -> String {
    summary.chars().take(SUMMARY_MAX_CHARS).collect()
}
