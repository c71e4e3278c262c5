//! Parameter binding utilities for statements.
//!
//! DML input is bound positionally by an explicit builder per entity
//! (`DmlParams`) instead of by reflecting over struct fields. Nulls are typed
//! so PostgreSQL can infer the column type from the bound value.

use sqlx::Any;
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use std::fmt;

/// Query type produced by the any driver.
pub type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// A positional bind parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlParam<'a> {
    /// Integer column, `None` binds a typed NULL.
    Int(Option<i64>),
    /// Text column, `None` binds a typed NULL.
    Text(Option<&'a str>),
}

impl<'a> SqlParam<'a> {
    pub fn int(value: i64) -> Self {
        Self::Int(Some(value))
    }

    pub fn text(value: &'a str) -> Self {
        Self::Text(Some(value))
    }

    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Int(None) | Self::Text(None))
    }
}

impl fmt::Display for SqlParam<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(Some(v)) => write!(f, "{v}"),
            Self::Text(Some(v)) => write!(f, "'{v}'"),
            Self::Int(None) | Self::Text(None) => write!(f, "NULL"),
        }
    }
}

/// Builds the ordered bind parameters of an entity's insert/update statement.
///
/// The order must match the `$N` placeholders of the entity's DML in the
/// statement catalog.
pub trait DmlParams {
    fn dml_params(&self) -> Vec<SqlParam<'_>>;
}

/// Bind a parameter to a query.
pub(crate) fn bind_param<'q>(query: AnyQuery<'q>, param: &SqlParam<'q>) -> AnyQuery<'q> {
    match *param {
        SqlParam::Int(v) => query.bind(v),
        SqlParam::Text(v) => query.bind(v),
    }
}

/// Build a query for `sql` with all parameters bound in order.
pub(crate) fn build_query<'q>(sql: &'q str, params: &[SqlParam<'q>]) -> AnyQuery<'q> {
    params
        .iter()
        .fold(sqlx::query::<Any>(sql), |query, param| bind_param(query, param))
}

/// Render key parameters for error messages and logs.
pub fn format_key(params: &[SqlParam<'_>]) -> String {
    params
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
