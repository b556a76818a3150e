//! Shared PostgreSQL harness for planvault integration tests.
//!
//! One PostgreSQL server per test binary, one throwaway database per
//! test. By default the server is a testcontainers-managed postgres
//! container; set `PLANVAULT_TEST_PG_URL` to a server root URL (no
//! database path) to reuse an already-running server, e.g. a CI service
//! container, and skip the per-binary container startup.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use planvault_db::config::DbConfig;
use planvault_db::pool;

/// The running server's base URL, plus the container handle when we
/// started one ourselves (held so it is not stopped mid-run).
static SERVER: OnceCell<(String, Option<ContainerAsync<Postgres>>)> = OnceCell::const_new();

async fn server_url() -> &'static str {
    let (url, _container) = SERVER
        .get_or_init(|| async {
            if let Ok(url) = std::env::var("PLANVAULT_TEST_PG_URL") {
                return (url, None);
            }

            let container = Postgres::default()
                .with_tag("17-alpine")
                .start()
                .await
                .expect("failed to start PostgreSQL container");

            let host = container.get_host().await.expect("failed to get container host");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("failed to get mapped port");

            (
                format!("postgresql://postgres:postgres@{host}:{port}"),
                Some(container),
            )
        })
        .await;
    url
}

/// Short-lived single-connection pool on the `postgres` maintenance
/// database, for CREATE/DROP DATABASE statements.
async fn admin_pool() -> PgPool {
    let url = format!("{}/postgres", server_url().await);
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&url)
        .await
        .expect("failed to connect to maintenance database")
}

/// Create a fresh `planvault_test_<uuid>` database with migrations applied.
///
/// Returns `(pool, db_name)`; pass the name to [`drop_test_db`] when the
/// test finishes.
pub async fn create_test_db() -> (PgPool, String) {
    let db_name = format!("planvault_test_{}", Uuid::new_v4().simple());

    let admin = admin_pool().await;
    sqlx::query(&format!("CREATE DATABASE {db_name}"))
        .execute(&admin)
        .await
        .unwrap_or_else(|e| panic!("failed to create test database {db_name}: {e}"));
    admin.close().await;

    // Connect through the crate's own pool constructor so tests exercise
    // the same pool configuration as production code.
    let config = DbConfig::new(format!("{}/{db_name}", server_url().await));
    let db_pool = pool::create_pool(&config)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to test database {db_name}: {e}"));

    pool::run_migrations(&db_pool)
        .await
        .expect("migrations should succeed");

    (db_pool, db_name)
}

/// Drop a test database, kicking off any lingering connections first.
///
/// Safe to call even if the database was already dropped.
pub async fn drop_test_db(db_name: &str) {
    let admin = admin_pool().await;

    let _ = sqlx::query(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = $1 AND pid <> pg_backend_pid()",
    )
    .bind(db_name)
    .execute(&admin)
    .await;

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS {db_name}"))
        .execute(&admin)
        .await;

    admin.close().await;
}
