//! Integration tests for the active_plans and plan_history query functions.
//!
//! Each test creates a unique temporary database, runs migrations, and
//! drops it on completion so tests are fully isolated.

use serde_json::json;
use uuid::Uuid;

use planvault_db::queries::active_plans::{
    NewActivePlan, advance_active_plan, advance_plan_by_id, get_active_plan, get_plan_owned,
    upsert_active_plan,
};
use planvault_db::queries::history::{get_snapshot, list_snapshots, record_snapshot};
use planvault_test_utils::{create_test_db, drop_test_db};

// -----------------------------------------------------------------------
// active_plans
// -----------------------------------------------------------------------

#[tokio::test]
async fn upsert_creates_row_with_generated_id() {
    let (pool, db_name) = create_test_db().await;

    let data = json!({"a": 1});
    let plan = upsert_active_plan(
        &pool,
        &NewActivePlan {
            owner_id: "u1",
            plan_type: "diet",
            version: 1,
            summary: "S",
            data: &data,
        },
    )
    .await
    .expect("upsert should succeed");

    assert_eq!(plan.owner_id, "u1");
    assert_eq!(plan.plan_type, "diet");
    assert_eq!(plan.version, 1);
    assert_eq!(plan.summary, "S");
    assert_eq!(plan.data, data);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn upsert_replaces_row_for_same_owner_and_type() {
    let (pool, db_name) = create_test_db().await;

    let first_data = json!({"a": 1});
    let first = upsert_active_plan(
        &pool,
        &NewActivePlan {
            owner_id: "u1",
            plan_type: "diet",
            version: 1,
            summary: "first",
            data: &first_data,
        },
    )
    .await
    .unwrap();

    let second_data = json!({"b": 2});
    let second = upsert_active_plan(
        &pool,
        &NewActivePlan {
            owner_id: "u1",
            plan_type: "diet",
            version: 7,
            summary: "second",
            data: &second_data,
        },
    )
    .await
    .unwrap();

    // Same row (plan_id survives), content replaced wholesale.
    assert_eq!(second.plan_id, first.plan_id);
    assert_eq!(second.version, 7);
    assert_eq!(second.summary, "second");
    assert_eq!(second.data, second_data);
    assert!(second.updated_at >= first.updated_at);

    // A different plan_type gets its own row.
    let other_data = json!({});
    let other = upsert_active_plan(
        &pool,
        &NewActivePlan {
            owner_id: "u1",
            plan_type: "cardio",
            version: 1,
            summary: "",
            data: &other_data,
        },
    )
    .await
    .unwrap();
    assert_ne!(other.plan_id, first.plan_id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_active_plan_returns_none_when_absent() {
    let (pool, db_name) = create_test_db().await;

    let result = get_active_plan(&pool, "nobody", "diet")
        .await
        .expect("query should not error");
    assert!(result.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_plan_owned_hides_other_owners_plans() {
    let (pool, db_name) = create_test_db().await;

    let data = json!({});
    let plan = upsert_active_plan(
        &pool,
        &NewActivePlan {
            owner_id: "u1",
            plan_type: "diet",
            version: 1,
            summary: "",
            data: &data,
        },
    )
    .await
    .unwrap();

    let mine = get_plan_owned(&pool, plan.plan_id, "u1").await.unwrap();
    assert!(mine.is_some());

    let theirs = get_plan_owned(&pool, plan.plan_id, "u2").await.unwrap();
    assert!(theirs.is_none());

    let missing = get_plan_owned(&pool, Uuid::new_v4(), "u1").await.unwrap();
    assert!(missing.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn advance_is_conditional_on_version() {
    let (pool, db_name) = create_test_db().await;

    let data = json!({"a": 1});
    let plan = upsert_active_plan(
        &pool,
        &NewActivePlan {
            owner_id: "u1",
            plan_type: "diet",
            version: 1,
            summary: "S",
            data: &data,
        },
    )
    .await
    .unwrap();

    // Matching version advances by exactly one.
    let updated = advance_active_plan(&pool, "u1", "diet", 1, "S2", None)
        .await
        .unwrap()
        .expect("matching version should update");
    assert_eq!(updated.version, 2);
    assert_eq!(updated.summary, "S2");
    // data = None keeps the stored value.
    assert_eq!(updated.data, data);

    // Stale version matches zero rows and mutates nothing.
    let stale = advance_active_plan(&pool, "u1", "diet", 1, "S3", None)
        .await
        .unwrap();
    assert!(stale.is_none());

    let current = get_plan_owned(&pool, plan.plan_id, "u1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.summary, "S2");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn advance_by_id_respects_owner_and_replaces_data() {
    let (pool, db_name) = create_test_db().await;

    let data = json!({"a": 1});
    let plan = upsert_active_plan(
        &pool,
        &NewActivePlan {
            owner_id: "u1",
            plan_type: "diet",
            version: 1,
            summary: "S",
            data: &data,
        },
    )
    .await
    .unwrap();

    // Wrong owner matches zero rows.
    let denied = advance_plan_by_id(&pool, plan.plan_id, "u2", 1, "S2", None)
        .await
        .unwrap();
    assert!(denied.is_none());

    // Supplied data replaces the stored value.
    let new_data = json!({"b": 2});
    let updated = advance_plan_by_id(&pool, plan.plan_id, "u1", 1, "S2", Some(&new_data))
        .await
        .unwrap()
        .expect("matching owner and version should update");
    assert_eq!(updated.version, 2);
    assert_eq!(updated.data, new_data);

    pool.close().await;
    drop_test_db(&db_name).await;
}

// -----------------------------------------------------------------------
// plan_history
// -----------------------------------------------------------------------

#[tokio::test]
async fn snapshots_roundtrip_and_list_ascending() {
    let (pool, db_name) = create_test_db().await;

    let data = json!({"a": 1});
    let plan = upsert_active_plan(
        &pool,
        &NewActivePlan {
            owner_id: "u1",
            plan_type: "diet",
            version: 1,
            summary: "v1",
            data: &data,
        },
    )
    .await
    .unwrap();

    record_snapshot(&pool, plan.plan_id, 1, "v1", &json!({"a": 1}))
        .await
        .unwrap();
    record_snapshot(&pool, plan.plan_id, 2, "v2", &json!({"a": 2}))
        .await
        .unwrap();

    let entry = get_snapshot(&pool, plan.plan_id, 2)
        .await
        .unwrap()
        .expect("snapshot at version 2 should exist");
    assert_eq!(entry.summary, "v2");
    assert_eq!(entry.data, json!({"a": 2}));

    let missing = get_snapshot(&pool, plan.plan_id, 3).await.unwrap();
    assert!(missing.is_none());

    let all = list_snapshots(&pool, plan.plan_id).await.unwrap();
    let versions: Vec<i64> = all.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![1, 2]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn record_snapshot_refreshes_existing_version() {
    let (pool, db_name) = create_test_db().await;

    let data = json!({});
    let plan = upsert_active_plan(
        &pool,
        &NewActivePlan {
            owner_id: "u1",
            plan_type: "diet",
            version: 1,
            summary: "",
            data: &data,
        },
    )
    .await
    .unwrap();

    record_snapshot(&pool, plan.plan_id, 1, "old", &json!({"a": 1}))
        .await
        .unwrap();
    record_snapshot(&pool, plan.plan_id, 1, "new", &json!({"a": 2}))
        .await
        .unwrap();

    // Refreshed in place, not duplicated.
    let all = list_snapshots(&pool, plan.plan_id).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].summary, "new");
    assert_eq!(all[0].data, json!({"a": 2}));

    pool.close().await;
    drop_test_db(&db_name).await;
}
