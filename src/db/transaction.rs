//! Transaction coordination.
//!
//! A `Tx` owns one pooled connection between `begin` and `commit`/`rollback`.
//! Every transaction-control call runs behind a panic boundary so a fault in
//! the driver surfaces as `StoreError::Recovered` instead of unwinding into
//! the caller.

use crate::context::RequestContext;
use crate::error::{StoreError, StoreResult};
use futures_util::FutureExt;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};
use std::any::Any as PanicPayload;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of a transaction handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// An open database transaction.
pub struct Tx {
    inner: Option<Transaction<'static, Any>>,
    state: TxState,
    request_id: u64,
    started: Instant,
}

impl Tx {
    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    /// Id of the request that began this transaction.
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Connection to run statements on. Fails once the transaction is finished.
    pub(crate) fn connection(&mut self) -> StoreResult<&mut AnyConnection> {
        match (self.state, self.inner.as_mut()) {
            (TxState::Active, Some(tx)) => Ok(&mut **tx),
            (state, _) => Err(StoreError::transaction(
                format!("transaction is {state}"),
                self.request_id,
            )),
        }
    }

    fn take_active(&mut self, operation: &str) -> StoreResult<Transaction<'static, Any>> {
        if self.state != TxState::Active {
            return Err(StoreError::transaction(
                format!("cannot {operation}: transaction is already {}", self.state),
                self.request_id,
            ));
        }
        self.inner.take().ok_or_else(|| {
            StoreError::transaction(
                format!("cannot {operation}: transaction has no connection"),
                self.request_id,
            )
        })
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("state", &self.state)
            .field("request_id", &self.request_id)
            .finish()
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if self.state == TxState::Active && self.inner.is_some() {
            warn!(
                request_id = self.request_id,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "Transaction dropped while active, driver will roll it back"
            );
        }
    }
}

/// Begins and finishes transactions on the shared pool.
#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    pool: AnyPool,
}

impl TransactionCoordinator {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction.
    pub async fn begin(&self, ctx: &RequestContext) -> StoreResult<Tx> {
        let request_id = ctx.request_id();
        ctx.ensure_active("begin")?;

        match AssertUnwindSafe(self.pool.begin()).catch_unwind().await {
            Ok(Ok(tx)) => {
                debug!(request_id, "Transaction started");
                Ok(Tx {
                    inner: Some(tx),
                    state: TxState::Active,
                    request_id,
                    started: Instant::now(),
                })
            }
            Ok(Err(e)) => Err(StoreError::driver("begin", request_id, 0, e)),
            Err(payload) => Err(recovered_panic("begin", payload, request_id)),
        }
    }

    /// Commit `tx`. A cancelled request rolls back instead and reports
    /// `Cancelled`.
    pub async fn commit(&self, ctx: &RequestContext, tx: Option<&mut Tx>) -> StoreResult<()> {
        let request_id = ctx.request_id();
        let tx = tx.ok_or_else(|| {
            StoreError::invalid_input("commit requires a transaction", request_id)
        })?;

        if ctx.is_cancelled() {
            warn!(request_id, "Request cancelled before commit, rolling back");
            self.rollback(ctx, Some(tx)).await?;
            return Err(StoreError::cancelled("commit", request_id));
        }

        let inner = tx.take_active("commit")?;
        match AssertUnwindSafe(inner.commit()).catch_unwind().await {
            Ok(Ok(())) => {
                tx.state = TxState::Committed;
                info!(
                    request_id,
                    elapsed_ms = tx.started.elapsed().as_millis() as u64,
                    "Transaction committed"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                tx.state = TxState::RolledBack;
                Err(StoreError::driver("commit", request_id, 0, e))
            }
            Err(payload) => {
                tx.state = TxState::RolledBack;
                Err(recovered_panic("commit", payload, request_id))
            }
        }
    }

    /// Roll back `tx`. Runs even when the request is cancelled.
    pub async fn rollback(&self, ctx: &RequestContext, tx: Option<&mut Tx>) -> StoreResult<()> {
        let request_id = ctx.request_id();
        let tx = tx.ok_or_else(|| {
            StoreError::invalid_input("rollback requires a transaction", request_id)
        })?;

        let inner = tx.take_active("rollback")?;
        tx.state = TxState::RolledBack;
        match AssertUnwindSafe(inner.rollback()).catch_unwind().await {
            Ok(Ok(())) => {
                info!(request_id, "Transaction rolled back");
                Ok(())
            }
            Ok(Err(e)) => Err(StoreError::driver("rollback", request_id, 0, e)),
            Err(payload) => Err(recovered_panic("rollback", payload, request_id)),
        }
    }

    /// Commit on `Ok`, roll back on `Err`. The original error wins over a
    /// failed rollback.
    pub async fn finish<T>(
        &self,
        ctx: &RequestContext,
        tx: &mut Tx,
        result: StoreResult<T>,
    ) -> StoreResult<T> {
        match result {
            Ok(value) => {
                self.commit(ctx, Some(tx)).await?;
                Ok(value)
            }
            Err(err) => {
                warn!(
                    request_id = ctx.request_id(),
                    code = err.code(),
                    error = %err,
                    "Rolling back after error"
                );
                if let Err(rollback_err) = self.rollback(ctx, Some(tx)).await {
                    warn!(
                        request_id = ctx.request_id(),
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                Err(err)
            }
        }
    }
}

/// Run one request-level operation behind a panic boundary.
pub async fn recover<T, F>(ctx: &RequestContext, operation: &str, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(recovered_panic(operation, payload, ctx.request_id())),
    }
}

fn recovered_panic(
    operation: &str,
    payload: Box<dyn PanicPayload + Send>,
    request_id: u64,
) -> StoreError {
    let message = panic_message(payload.as_ref());
    warn!(request_id, operation, panic = %message, "Recovered from panic");
    StoreError::recovered(operation, message, request_id)
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn PanicPayload + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tokio_util::sync::CancellationToken;

    async fn memory_pool() -> AnyPool {
        sqlx::any::install_default_drivers();
        sqlx::any::AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn PanicPayload + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn PanicPayload + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn PanicPayload + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_recover_converts_panic() {
        let ctx = RequestContext::new(7);
        let result: StoreResult<()> = recover(&ctx, "explode", async { panic!("kaboom") }).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RecoveredFault);
        assert_eq!(err.request_id(), 7);
        assert!(err.to_string().contains("kaboom"));
    }

    #[tokio::test]
    async fn test_missing_handle_is_input_error() {
        let coordinator = TransactionCoordinator::new(memory_pool().await);
        let ctx = RequestContext::new(1);
        let err = coordinator.commit(&ctx, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        let err = coordinator.rollback(&ctx, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[tokio::test]
    async fn test_state_machine_rejects_second_finish() {
        let coordinator = TransactionCoordinator::new(memory_pool().await);
        let ctx = RequestContext::new(2);

        let mut tx = coordinator.begin(&ctx).await.unwrap();
        assert!(tx.is_active());
        coordinator.commit(&ctx, Some(&mut tx)).await.unwrap();
        assert_eq!(tx.state(), TxState::Committed);

        let err = coordinator.rollback(&ctx, Some(&mut tx)).await.unwrap_err();
        assert!(matches!(err, StoreError::Transaction { .. }));
        let err = coordinator.commit(&ctx, Some(&mut tx)).await.unwrap_err();
        assert!(matches!(err, StoreError::Transaction { .. }));
        assert!(tx.connection().is_err());

        let mut tx = coordinator.begin(&ctx).await.unwrap();
        coordinator.rollback(&ctx, Some(&mut tx)).await.unwrap();
        assert_eq!(tx.state(), TxState::RolledBack);
        assert!(coordinator.commit(&ctx, Some(&mut tx)).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_begin_and_commit() {
        let coordinator = TransactionCoordinator::new(memory_pool().await);
        let token = CancellationToken::new();
        let ctx = RequestContext::new(3).with_cancellation(token.clone());

        let mut tx = coordinator.begin(&ctx).await.unwrap();
        token.cancel();
        let err = coordinator.commit(&ctx, Some(&mut tx)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(tx.state(), TxState::RolledBack);

        let err = coordinator.begin(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_finish_rolls_back_on_error() {
        let coordinator = TransactionCoordinator::new(memory_pool().await);
        let ctx = RequestContext::new(4);
        let mut tx = coordinator.begin(&ctx).await.unwrap();
        let result: StoreResult<()> = Err(StoreError::invalid_input("bad", 4));
        let err = coordinator.finish(&ctx, &mut tx, result).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(tx.state(), TxState::RolledBack);
    }
}
