//! Statement registry.
//!
//! A named, immutable catalog of SQL text. Read statements are prepared
//! against the live database when the registry is built, so a malformed query
//! stops startup instead of failing mid-traffic. DML statements are bound per
//! call and only have their placeholder count recorded.

use crate::error::{StoreError, StoreResult};
use sqlx::{AnyPool, Executor, Statement};
use std::collections::HashMap;
use tracing::{debug, info};

/// One registered statement.
#[derive(Debug, Clone)]
pub struct StatementDescriptor {
    name: &'static str,
    sql: &'static str,
    prepare: bool,
    param_count: usize,
}

impl StatementDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn sql(&self) -> &'static str {
        self.sql
    }

    /// Whether the statement is prepared at startup.
    pub fn is_prepare(&self) -> bool {
        self.prepare
    }

    /// Highest `$N` placeholder in the SQL text.
    pub fn param_count(&self) -> usize {
        self.param_count
    }
}

/// Collects statements before they are resolved against the database.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    statements: Vec<StatementDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statement. Later registrations replace earlier ones of the
    /// same name.
    pub fn register(mut self, name: &'static str, sql: &'static str, prepare: bool) -> Self {
        self.statements.retain(|s| s.name != name);
        self.statements.push(StatementDescriptor {
            name,
            sql,
            prepare,
            param_count: count_placeholders(sql),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Prepare every read statement on `pool` and freeze the registry.
    ///
    /// Fails on the first statement the database rejects.
    pub async fn prepare(self, pool: &AnyPool) -> StoreResult<StatementRegistry> {
        let mut statements = HashMap::with_capacity(self.statements.len());
        for descriptor in self.statements {
            if descriptor.prepare {
                let prepared = pool.prepare(descriptor.sql).await.map_err(|source| {
                    StoreError::Prepare {
                        statement: descriptor.name.to_string(),
                        source,
                    }
                })?;
                debug!(
                    statement = descriptor.name,
                    columns = prepared.columns().len(),
                    "SQL statement is prepared"
                );
            }
            statements.insert(descriptor.name, descriptor);
        }
        info!(count = statements.len(), "Statement registry is ready");
        Ok(StatementRegistry { statements })
    }

    /// Freeze the registry without touching a database. Statements marked
    /// for preparation stay unprepared.
    pub fn build_unprepared(self) -> StatementRegistry {
        StatementRegistry {
            statements: self
                .statements
                .into_iter()
                .map(|descriptor| (descriptor.name, descriptor))
                .collect(),
        }
    }
}

/// Read-only after construction; safe for concurrent lookup.
#[derive(Debug)]
pub struct StatementRegistry {
    statements: HashMap<&'static str, StatementDescriptor>,
}

impl StatementRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up a statement; an unregistered name is a programming error.
    pub fn lookup(&self, name: &str) -> StoreResult<&StatementDescriptor> {
        self.statements
            .get(name)
            .ok_or_else(|| StoreError::statement_not_defined(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.statements.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Highest `$N` placeholder index in `sql`, ignoring quoted literals.
fn count_placeholders(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0;
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'$' if !in_quote => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if let Ok(n) = sql[start..end].parse::<usize>() {
                    max = max.max(n);
                }
                i = end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    max
}
