//! Integration tests for startup: the catalog must prepare before any traffic.

use hr_store::Database;
use hr_store::config::DatabaseConfig;
use hr_store::models::{ModelPool, PoolStats};
use std::sync::Arc;

fn models() -> Arc<ModelPool> {
    Arc::new(ModelPool::new(8, Arc::new(PoolStats::new())))
}

#[tokio::test]
async fn test_startup_fails_without_schema() {
    sqlx::any::install_default_drivers();
    let pool = sqlx::any::AnyPoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    match Database::from_pool(pool, models(), false).await {
        Ok(_) => panic!("catalog prepared against an empty database"),
        Err(e) => assert_eq!(e.code(), "E_PREPARE"),
    }
}

#[tokio::test]
async fn test_connect_prepares_after_creating_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hr.db");
    let config = DatabaseConfig::sqlite(path.to_str().unwrap());

    match Database::connect(&config, models(), false).await {
        Ok(_) => panic!("catalog prepared against an empty database"),
        Err(e) => assert_eq!(e.code(), "E_PREPARE"),
    }

    let db = Database::connect(&config, models(), true).await.unwrap();
    assert!(db.executor().statements().contains("GetDept"));
    db.close().await;
}
