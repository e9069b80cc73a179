//! Database Test Utilities
//!
//! Starts a throwaway PostgreSQL container, applies the schema and hands
//! out a pool. Tests using these helpers need a docker daemon and are
//! marked `#[ignore]` so the default test run stays hermetic.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "hospital";
const POSTGRES_PASSWORD: &str = "hospital";
const POSTGRES_DB: &str = "hospital_test";

const SCHEMA: &str = include_str!("../../../migrations/20240101_000001_initial_schema.sql");

/// Children first so TRUNCATE never trips a foreign key
const TABLES: &[&str] = &[
    "stock_movements",
    "purchase_items",
    "purchases",
    "sale_items",
    "sales",
    "medicines",
    "bill_refunds",
    "payments",
    "insurance_claims",
    "bill_items",
    "bills",
    "patient_insurances",
    "insurance_providers",
    "document_counters",
];

pub type TestDbResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A PostgreSQL container with the hospital schema applied
pub struct TestDatabase {
    _container: ContainerAsync<Postgres>,
    pub url: String,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a container and applies the schema
    pub async fn new() -> TestDbResult<Self> {
        let container = Postgres::default()
            .with_user(POSTGRES_USER)
            .with_password(POSTGRES_PASSWORD)
            .with_db_name(POSTGRES_DB)
            .with_tag(POSTGRES_TAG)
            .start()
            .await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let url = format!(
            "postgres://{}:{}@{}:{}/{}",
            POSTGRES_USER, POSTGRES_PASSWORD, host, port, POSTGRES_DB
        );

        // Concurrency tests open several transactions at once
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { _container: container, url, pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Empties every table, keeping the schema
    pub async fn clear_data(&self) -> TestDbResult<()> {
        let statement = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", TABLES.join(", "));
        sqlx::query(&statement).execute(&self.pool).await?;
        Ok(())
    }

    /// Number of rows currently in `table`
    pub async fn count_rows(&self, table: &str) -> TestDbResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// A container shared by every test in the binary
///
/// # Panics
///
/// Panics if the container cannot be started
pub async fn get_shared_test_database() -> Arc<TestDatabase> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            Arc::new(TestDatabase::new().await.expect("Failed to create shared test database"))
        })
        .await
        .clone()
}

/// A private container for tests that need a clean slate
pub async fn create_isolated_test_database() -> TestDbResult<TestDatabase> {
    TestDatabase::new().await
}

/// Declares an ignored tokio test that receives an isolated database as `db`
#[macro_export]
macro_rules! db_test {
    ($name:ident, |$db:ident| $body:block) => {
        #[tokio::test]
        #[ignore = "requires a running docker daemon"]
        async fn $name() {
            let $db = $crate::database::create_isolated_test_database()
                .await
                .expect("Failed to create test database");
            $body
        }
    };
}
