use airline_reservation_system::db::MySqlStore;
use dotenv::dotenv;
use once_cell::sync::OnceCell;
use sqlx::mysql::MySqlPool as Pool;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{Error, Executor};
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

// Every #[tokio::test] runs on its own runtime, so pools are never shared
// between tests. Only the database itself is created once per run.
static DB_READY: OnceCell<Mutex<bool>> = OnceCell::new();
static DB_NAME: OnceCell<String> = OnceCell::new();

pub struct TestDb;

// Tests against MySQL only run when an admin connection string is configured
fn admin_url() -> Option<String> {
    dotenv().ok();
    env::var("ADMIN_DATABASE_URL").ok()
}

fn server_url(admin_url: &str) -> String {
    admin_url.split('/').collect::<Vec<&str>>()[..3].join("/")
}

fn db_name() -> &'static str {
    DB_NAME.get_or_init(|| {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        format!("reservation_test_{}_{}", timestamp, std::process::id())
    })
}

// Create a connection pool without a database, used to create a new database
async fn create_connection_pool_without_db(admin_url: &str) -> Result<Pool, Error> {
    MySqlPoolOptions::new()
        .max_connections(2)
        .connect(&server_url(admin_url))
        .await
}

// Create a connection pool with the test database
async fn create_connection_pool_with_db(admin_url: &str) -> Result<Pool, Error> {
    MySqlPoolOptions::new()
        .max_connections(20)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET SESSION TRANSACTION ISOLATION LEVEL REPEATABLE READ")
                    .await?;
                Ok(())
            })
        })
        .connect(&format!("{}/{}", server_url(admin_url), db_name()))
        .await
}

impl TestDb {
    /// A store on the shared test database, or `None` when MySQL tests are
    /// not configured.
    pub async fn store() -> Result<Option<MySqlStore>, Error> {
        let admin_url = match admin_url() {
            Some(url) => url,
            None => return Ok(None),
        };

        let ready = DB_READY.get_or_init(|| Mutex::new(false));
        let mut guard = ready.lock().await;
        if !*guard {
            println!("Creating test database: {}", db_name());
            let admin_pool = create_connection_pool_without_db(&admin_url).await?;
            sqlx::query(&format!("CREATE DATABASE IF NOT EXISTS {}", db_name()))
                .execute(&admin_pool)
                .await?;

            let store = MySqlStore::from_pool(create_connection_pool_with_db(&admin_url).await?);
            store.create_schema().await?;
            *guard = true;
        }
        drop(guard);

        let pool = create_connection_pool_with_db(&admin_url).await?;
        Ok(Some(MySqlStore::from_pool(pool)))
    }

    // Teardown function to drop the database after the test run
    pub async fn cleanup_database() -> Result<(), Error> {
        let created = match DB_READY.get() {
            Some(ready) => *ready.lock().await,
            None => false,
        };
        if let (true, Some(admin_url)) = (created, admin_url()) {
            println!("Dropping database: {}", db_name());
            let admin_pool = create_connection_pool_without_db(&admin_url).await?;
            sqlx::query(&format!("DROP DATABASE IF EXISTS {}", db_name()))
                .execute(&admin_pool)
                .await?;
        }
        Ok(())
    }

    pub fn cleanup_database_sync() -> Result<(), Error> {
        let runtime = tokio::runtime::Runtime::new().map_err(Error::Io)?;
        runtime.block_on(Self::cleanup_database())
    }
}
