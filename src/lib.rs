//! HR store library.
//!
//! Transactional persistence for departments and their employees over
//! PostgreSQL or SQLite: a prepared statement catalog, generic data-access
//! primitives, cascading repositories and pools for entities and buffers.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;

pub use config::Config;
pub use context::{RequestContext, RequestIdGenerator};
pub use db::Database;
pub use error::{ErrorKind, StoreError, StoreResult};
