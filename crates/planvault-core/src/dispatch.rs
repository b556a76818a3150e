//! The operation table and per-operation handlers.
//!
//! Each handler validates its payload, runs the storage calls, and returns
//! either a typed response or an [`OpError`]. Writes that also append a
//! history snapshot run inside a single transaction, so an active plan
//! version never exists without its snapshot.

use anyhow::Context;
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::debug;

use planvault_db::queries::active_plans::{
    NewActivePlan, advance_active_plan, advance_plan_by_id, get_active_plan, get_plan_owned,
    upsert_active_plan,
};
use planvault_db::queries::history::{get_snapshot, list_snapshots, record_snapshot};

use crate::error::OpError;
use crate::request::{
    ActivePlanKeyPayload, HistoryResponse, OpRequest, PatchActivePlanPayload, PatchPlanPayload,
    PlanIdPayload, PlanRecord, RollbackPlanPayload, StartPlanPayload, clamp_summary, parse_payload,
};

/// Dispatch one operation request against the store.
///
/// Unknown and missing `op` values are rejected before the payload is
/// looked at. Every operation except `ping` validates its payload fields
/// before issuing any storage call.
pub async fn dispatch(pool: &PgPool, req: OpRequest) -> Result<Value, OpError> {
    let op = req
        .op
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(OpError::MissingOp)?;

    debug!(op, "dispatching plan operation");

    match op {
        "ping" => Ok(json!({ "ok": true, "msg": "Connected!" })),
        "start_plan" => respond(start_plan(pool, parse_payload(&req.payload)?).await?),
        "get_active_plan" => respond(active_plan(pool, parse_payload(&req.payload)?).await?),
        "get_plan" => respond(plan_by_id(pool, parse_payload(&req.payload)?).await?),
        "patch_active_plan" => {
            respond(patch_active_plan(pool, parse_payload(&req.payload)?).await?)
        }
        "patch_plan" => respond(patch_plan(pool, parse_payload(&req.payload)?).await?),
        "rollback_plan" => respond(rollback_plan(pool, parse_payload(&req.payload)?).await?),
        "list_history" => respond(list_history(pool, parse_payload(&req.payload)?).await?),
        other => Err(OpError::UnknownOp(other.to_owned())),
    }
}

fn respond<T: Serialize>(value: T) -> Result<Value, OpError> {
    serde_json::to_value(value)
        .context("failed to serialize response")
        .map_err(OpError::from)
}

/// Create (or replace) the active plan for an (owner, type) pair.
///
/// The version comes from `state_json` when supplied, defaulting to 1; an
/// existing plan of the same owner+type is replaced wholesale, so callers
/// must not rely on version continuity across a restart.
async fn start_plan(pool: &PgPool, p: StartPlanPayload) -> Result<PlanRecord, OpError> {
    let version = p.state_json.version.unwrap_or(1);
    if version < 1 {
        return Err(OpError::Validation(format!(
            "state_json.version must be >= 1, got {version}"
        )));
    }
    let summary = p.state_json.summary.unwrap_or_default();
    let data = p.state_json.data.unwrap_or_else(|| json!({}));

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let plan = upsert_active_plan(
        &mut *tx,
        &NewActivePlan {
            owner_id: &p.owner_id,
            plan_type: &p.plan_type,
            version,
            summary: &summary,
            data: &data,
        },
    )
    .await?;
    record_snapshot(&mut *tx, plan.plan_id, plan.version, &plan.summary, &plan.data).await?;
    tx.commit().await.context("failed to commit start_plan")?;

    Ok(plan.into())
}

async fn active_plan(pool: &PgPool, p: ActivePlanKeyPayload) -> Result<PlanRecord, OpError> {
    let plan = get_active_plan(pool, &p.owner_id, &p.plan_type)
        .await?
        .ok_or(OpError::NotFound)?;
    Ok(plan.into())
}

async fn plan_by_id(pool: &PgPool, p: PlanIdPayload) -> Result<PlanRecord, OpError> {
    let plan = get_plan_owned(pool, p.plan_id, &p.owner_id)
        .await?
        .ok_or(OpError::NotFound)?;
    Ok(plan.into())
}

/// Optimistically patch the active plan for an (owner, type) pair.
///
/// The version check and the write are one conditional UPDATE; when it
/// matches nothing, a follow-up read decides between a conflict (row still
/// there, version moved) and not-found.
async fn patch_active_plan(pool: &PgPool, p: PatchActivePlanPayload) -> Result<PlanRecord, OpError> {
    let summary = clamp_summary(p.new_state_json.summary.as_deref().unwrap_or(""));
    let data = p.new_state_json.data;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let updated = advance_active_plan(
        &mut *tx,
        &p.owner_id,
        &p.plan_type,
        p.expected_version,
        &summary,
        data.as_ref(),
    )
    .await?;

    match updated {
        Some(plan) => {
            record_snapshot(&mut *tx, plan.plan_id, plan.version, &plan.summary, &plan.data)
                .await?;
            tx.commit().await.context("failed to commit patch")?;
            Ok(plan.into())
        }
        None => {
            // Dropping the transaction rolls it back; nothing was written.
            drop(tx);
            match get_active_plan(pool, &p.owner_id, &p.plan_type).await? {
                Some(current) => Err(OpError::VersionConflict {
                    current_version: current.version,
                }),
                None => Err(OpError::NotFound),
            }
        }
    }
}

/// Same as [`patch_active_plan`], addressed by plan id instead of the
/// (owner, type) pair.
async fn patch_plan(pool: &PgPool, p: PatchPlanPayload) -> Result<PlanRecord, OpError> {
    let summary = clamp_summary(p.new_state_json.summary.as_deref().unwrap_or(""));
    let data = p.new_state_json.data;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let updated = advance_plan_by_id(
        &mut *tx,
        p.plan_id,
        &p.owner_id,
        p.expected_version,
        &summary,
        data.as_ref(),
    )
    .await?;

    match updated {
        Some(plan) => {
            record_snapshot(&mut *tx, plan.plan_id, plan.version, &plan.summary, &plan.data)
                .await?;
            tx.commit().await.context("failed to commit patch")?;
            Ok(plan.into())
        }
        None => {
            drop(tx);
            match get_plan_owned(pool, p.plan_id, &p.owner_id).await? {
                Some(current) => Err(OpError::VersionConflict {
                    current_version: current.version,
                }),
                None => Err(OpError::NotFound),
            }
        }
    }
}

/// Roll a plan back to the content of a prior snapshot.
///
/// Rollback is a forward-moving write: the snapshot's summary and data are
/// copied into version `current + 1`, and a fresh history entry is
/// appended, so version numbers stay a strictly increasing audit trail.
async fn rollback_plan(pool: &PgPool, p: RollbackPlanPayload) -> Result<PlanRecord, OpError> {
    let current = get_plan_owned(pool, p.plan_id, &p.owner_id)
        .await?
        .ok_or(OpError::NotFound)?;

    let snapshot = get_snapshot(pool, p.plan_id, p.target_version)
        .await?
        .ok_or(OpError::SnapshotNotFound {
            target_version: p.target_version,
        })?;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let updated = advance_plan_by_id(
        &mut *tx,
        p.plan_id,
        &p.owner_id,
        current.version,
        &snapshot.summary,
        Some(&snapshot.data),
    )
    .await?;

    match updated {
        Some(plan) => {
            record_snapshot(&mut *tx, plan.plan_id, plan.version, &plan.summary, &plan.data)
                .await?;
            tx.commit().await.context("failed to commit rollback")?;
            Ok(plan.into())
        }
        None => {
            // A concurrent write advanced the plan between our read and the
            // rollback write. Report the conflict with the fresh version.
            drop(tx);
            match get_plan_owned(pool, p.plan_id, &p.owner_id).await? {
                Some(current) => Err(OpError::VersionConflict {
                    current_version: current.version,
                }),
                None => Err(OpError::NotFound),
            }
        }
    }
}

/// List every recorded snapshot for a plan lineage, oldest first.
async fn list_history(pool: &PgPool, p: PlanIdPayload) -> Result<HistoryResponse, OpError> {
    let plan = get_plan_owned(pool, p.plan_id, &p.owner_id)
        .await?
        .ok_or(OpError::NotFound)?;

    let entries = list_snapshots(pool, plan.plan_id).await?;

    Ok(HistoryResponse {
        plan_id: plan.plan_id,
        entries: entries.into_iter().map(Into::into).collect(),
    })
}
