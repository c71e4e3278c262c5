//! Request correlation and cancellation.
//!
//! A `RequestContext` is created at the request-handling boundary and passed
//! by reference into every repository call. It carries the correlation id used
//! in every log line and a cancellation token checked at each database round
//! trip.

use crate::error::{StoreError, StoreResult};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Request id used when the caller did not supply one.
pub const UNKNOWN_REQUEST_ID: u64 = 0;

/// Per-request ambient state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    request_id: u64,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Create a context with the given correlation id.
    pub fn new(request_id: u64) -> Self {
        Self {
            request_id,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Token that cancels this request.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with `Cancelled` if the request has been abandoned.
    pub fn ensure_active(&self, operation: &str) -> StoreResult<()> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::cancelled(operation, self.request_id));
        }
        Ok(())
    }
}

/// Hands out request ids. Owned by the request-handling boundary.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    last: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id; never returns `UNKNOWN_REQUEST_ID`.
    pub fn next_id(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Fresh context carrying the next id.
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.next_id())
    }
}
