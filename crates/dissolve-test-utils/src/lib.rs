//! Throwaway PostgreSQL databases for dissolve integration tests.
//!
//! Every test binary shares one server: the one named by
//! `DISSOLVE_TEST_PG_URL` (PostgreSQL 13 or newer), or a `postgres:16`
//! container started on first use. Each test creates its own migrated
//! database on that server and drops it when done.

use sqlx::{Executor, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use dissolve_db::pool;

const SERVER_URL_ENV_VAR: &str = "DISSOLVE_TEST_PG_URL";

struct TestServer {
    base_url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

impl TestServer {
    async fn start() -> Self {
        if let Ok(url) = std::env::var(SERVER_URL_ENV_VAR) {
            return Self {
                base_url: url.trim_end_matches('/').to_owned(),
                _container: None,
            };
        }

        let container = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .expect("postgres container should start");
        let host = container.get_host().await.expect("container host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("container port 5432 should be mapped");

        Self {
            base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
            _container: Some(container),
        }
    }

    async fn admin(&self) -> PgPool {
        pool::connect_url(&format!("{}/postgres", self.base_url), 1)
            .await
            .expect("maintenance database should accept connections")
    }
}

static SERVER: OnceCell<TestServer> = OnceCell::const_new();

async fn server() -> &'static TestServer {
    SERVER.get_or_init(TestServer::start).await
}

/// Connection URL for `db_name` on the shared test server. The database is
/// not created.
pub async fn database_url(db_name: &str) -> String {
    format!("{}/{db_name}", server().await.base_url)
}

/// Create a fresh, migrated database. Returns `(pool, db_name)`; pass
/// `db_name` to [`drop_test_db`] at the end of the test.
pub async fn create_test_db() -> (PgPool, String) {
    let db_name = format!("dissolve_test_{}", Uuid::new_v4().simple());

    let admin = server().await.admin().await;
    admin
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("CREATE DATABASE {db_name} failed: {e}"));
    admin.close().await;

    let db = pool::connect_url(&database_url(&db_name).await, 5)
        .await
        .unwrap_or_else(|e| panic!("connecting to {db_name} failed: {e:#}"));
    pool::run_migrations(&db)
        .await
        .expect("migrations should apply to a fresh database");

    (db, db_name)
}

/// Drop a test database, closing any sessions still attached to it.
pub async fn drop_test_db(db_name: &str) {
    let admin = server().await.admin().await;
    let _ = admin
        .execute(format!("DROP DATABASE IF EXISTS {db_name} WITH (FORCE)").as_str())
        .await;
    admin.close().await;
}
