//! Database query functions for the `active_plans` table.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::ActivePlan;

/// Parameters for creating (or replacing) an active plan row.
#[derive(Debug, Clone)]
pub struct NewActivePlan<'a> {
    pub owner_id: &'a str,
    pub plan_type: &'a str,
    pub version: i64,
    pub summary: &'a str,
    pub data: &'a Value,
}

/// Upsert an active plan keyed on (owner_id, plan_type).
///
/// A pre-existing row for the same pair is replaced wholesale: version,
/// summary, and data are overwritten and `updated_at` is reset. Returns the
/// resulting row with server-generated defaults (plan_id on first insert).
pub async fn upsert_active_plan(
    ex: impl PgExecutor<'_>,
    new: &NewActivePlan<'_>,
) -> Result<ActivePlan> {
    let plan = sqlx::query_as::<_, ActivePlan>(
        "INSERT INTO active_plans (owner_id, plan_type, version, summary, data) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (owner_id, plan_type) DO UPDATE \
         SET version = EXCLUDED.version, \
             summary = EXCLUDED.summary, \
             data = EXCLUDED.data, \
             updated_at = now() \
         RETURNING *",
    )
    .bind(new.owner_id)
    .bind(new.plan_type)
    .bind(new.version)
    .bind(new.summary)
    .bind(new.data)
    .fetch_one(ex)
    .await
    .with_context(|| {
        format!(
            "failed to upsert active plan for owner {} type {}",
            new.owner_id, new.plan_type
        )
    })?;

    Ok(plan)
}

/// Fetch the active plan for an (owner_id, plan_type) pair.
pub async fn get_active_plan(
    ex: impl PgExecutor<'_>,
    owner_id: &str,
    plan_type: &str,
) -> Result<Option<ActivePlan>> {
    let plan = sqlx::query_as::<_, ActivePlan>(
        "SELECT * FROM active_plans WHERE owner_id = $1 AND plan_type = $2",
    )
    .bind(owner_id)
    .bind(plan_type)
    .fetch_optional(ex)
    .await
    .context("failed to fetch active plan")?;

    Ok(plan)
}

/// Fetch a plan by id, restricted to the given owner.
///
/// The ownership check is folded into the WHERE clause so a mismatch is
/// indistinguishable from a missing row.
pub async fn get_plan_owned(
    ex: impl PgExecutor<'_>,
    plan_id: Uuid,
    owner_id: &str,
) -> Result<Option<ActivePlan>> {
    let plan = sqlx::query_as::<_, ActivePlan>(
        "SELECT * FROM active_plans WHERE plan_id = $1 AND owner_id = $2",
    )
    .bind(plan_id)
    .bind(owner_id)
    .fetch_optional(ex)
    .await
    .context("failed to fetch plan by id")?;

    Ok(plan)
}

/// Advance a plan to the next version, conditional on the current version
/// matching `expected_version`.
///
/// The version check and the write are a single UPDATE statement, so two
/// racing patches cannot both observe the same version and both commit.
/// `data = None` keeps the stored value. The owner restriction is part of
/// the WHERE clause, like [`get_plan_owned`]. Returns `None` when zero rows
/// matched: the version moved on, the row is gone, or the owner does not
/// match; the caller distinguishes these with a follow-up read.
pub async fn advance_plan_by_id(
    ex: impl PgExecutor<'_>,
    plan_id: Uuid,
    owner_id: &str,
    expected_version: i64,
    summary: &str,
    data: Option<&Value>,
) -> Result<Option<ActivePlan>> {
    let plan = sqlx::query_as::<_, ActivePlan>(
        "UPDATE active_plans \
         SET version = version + 1, \
             summary = $4, \
             data = COALESCE($5, data), \
             updated_at = now() \
         WHERE plan_id = $1 AND owner_id = $2 AND version = $3 \
         RETURNING *",
    )
    .bind(plan_id)
    .bind(owner_id)
    .bind(expected_version)
    .bind(summary)
    .bind(data)
    .fetch_optional(ex)
    .await
    .with_context(|| format!("failed to advance plan {plan_id} from version {expected_version}"))?;

    Ok(plan)
}

/// Same conditional advance as [`advance_plan_by_id`], keyed on the
/// (owner_id, plan_type) unique pair instead of the plan id.
pub async fn advance_active_plan(
    ex: impl PgExecutor<'_>,
    owner_id: &str,
    plan_type: &str,
    expected_version: i64,
    summary: &str,
    data: Option<&Value>,
) -> Result<Option<ActivePlan>> {
    let plan = sqlx::query_as::<_, ActivePlan>(
        "UPDATE active_plans \
         SET version = version + 1, \
             summary = $4, \
             data = COALESCE($5, data), \
             updated_at = now() \
         WHERE owner_id = $1 AND plan_type = $2 AND version = $3 \
         RETURNING *",
    )
    .bind(owner_id)
    .bind(plan_type)
    .bind(expected_version)
    .bind(summary)
    .bind(data)
    .fetch_optional(ex)
    .await
    .with_context(|| {
        format!(
            "failed to advance active plan for owner {owner_id} type {plan_type} \
             from version {expected_version}"
        )
    })?;

    Ok(plan)
}
