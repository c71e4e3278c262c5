//! Shared setup for integration tests: a fresh SQLite store per test.

#![allow(dead_code)]

use hr_store::config::DatabaseConfig;
use hr_store::models::{Department, Employee, ModelPool, PoolStats};
use hr_store::{Database, RequestContext, RequestIdGenerator};
use sqlx::Executor;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestStore {
    pub db: Database,
    pub ids: RequestIdGenerator,
    pub stats: Arc<PoolStats>,
    // Keeps the database file alive for the test's duration
    _dir: TempDir,
}

impl TestStore {
    pub fn ctx(&self) -> RequestContext {
        self.ids.context()
    }

    /// Run raw SQL against the store, e.g. to install triggers.
    pub async fn execute(&self, sql: &str) {
        self.db.pool().execute(sql).await.unwrap();
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }
}

/// Create a store backed by a temporary SQLite file with the schema in place.
pub async fn setup() -> TestStore {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hr.db");
    let config = DatabaseConfig::sqlite(path.to_str().unwrap());
    let stats = Arc::new(PoolStats::new());
    let models = Arc::new(ModelPool::new(64, Arc::clone(&stats)));
    let db = Database::connect(&config, models, true).await.unwrap();
    TestStore {
        db,
        ids: RequestIdGenerator::new(),
        stats,
        _dir: dir,
    }
}

pub fn employee(id: i64, name: &str) -> Employee {
    Employee {
        id,
        name: Some(name.to_string()),
        ..Employee::default()
    }
}

pub fn department(id: i64, name: &str, location: Option<&str>) -> Department {
    Department {
        id,
        name: name.to_string(),
        location: location.map(str::to_string),
        employees: Vec::new(),
    }
}

/// Department 10 SALES/NY with ALICE earning 500.
pub fn sales() -> Department {
    let mut dept = department(10, "SALES", Some("NY"));
    dept.employees.push(Employee {
        salary: Some(500),
        ..employee(1, "ALICE")
    });
    dept
}
