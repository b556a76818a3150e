//! Database query functions for the `plan_history` table.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::PlanHistoryEntry;

/// Record a snapshot of a plan's content at the given version.
///
/// History rows are append-only with one exception: re-creating a plan
/// lineage at a version that already has a snapshot (a repeated
/// `start_plan`) refreshes that snapshot in place instead of failing the
/// unique constraint.
pub async fn record_snapshot(
    ex: impl PgExecutor<'_>,
    plan_id: Uuid,
    version: i64,
    summary: &str,
    data: &Value,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO plan_history (plan_id, version, summary, data) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (plan_id, version) DO UPDATE \
         SET summary = EXCLUDED.summary, \
             data = EXCLUDED.data, \
             recorded_at = now()",
    )
    .bind(plan_id)
    .bind(version)
    .bind(summary)
    .bind(data)
    .execute(ex)
    .await
    .with_context(|| format!("failed to record snapshot of plan {plan_id} at version {version}"))?;

    Ok(())
}

/// Fetch the snapshot of a plan at a specific version, if one exists.
pub async fn get_snapshot(
    ex: impl PgExecutor<'_>,
    plan_id: Uuid,
    version: i64,
) -> Result<Option<PlanHistoryEntry>> {
    let entry = sqlx::query_as::<_, PlanHistoryEntry>(
        "SELECT * FROM plan_history WHERE plan_id = $1 AND version = $2",
    )
    .bind(plan_id)
    .bind(version)
    .fetch_optional(ex)
    .await
    .with_context(|| format!("failed to fetch snapshot of plan {plan_id} at version {version}"))?;

    Ok(entry)
}

/// List all snapshots for a plan lineage, ordered by version ascending.
pub async fn list_snapshots(
    ex: impl PgExecutor<'_>,
    plan_id: Uuid,
) -> Result<Vec<PlanHistoryEntry>> {
    let entries = sqlx::query_as::<_, PlanHistoryEntry>(
        "SELECT * FROM plan_history WHERE plan_id = $1 ORDER BY version ASC",
    )
    .bind(plan_id)
    .fetch_all(ex)
    .await
    .with_context(|| format!("failed to list snapshots for plan {plan_id}"))?;

    Ok(entries)
}
