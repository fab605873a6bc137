//! Exactly-once commit/rollback around a group of writes.
//!
//! `TransactionScope::run` begins a transaction, hands it to the operation once,
//! and then either commits (operation succeeded) or rolls back (operation failed,
//! panicked, or ran past the deadline). The handle never escapes the scope.
//! If the future returned by `run` is dropped mid-flight the handle is dropped
//! too, and sqlx rolls back a transaction that is dropped without commit.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::StoreError;

/// Anything that can hand out a transaction and later finish it
#[async_trait]
pub trait Transactional: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), sqlx::Error>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl Transactional for PgPool {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error> {
        sqlx::Pool::begin(self).await
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), sqlx::Error> {
        tx.commit().await
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), sqlx::Error> {
        tx.rollback().await
    }
}

#[derive(Clone)]
pub struct TransactionScope<S> {
    source: S,
    timeout: Option<Duration>,
}

impl<S: Transactional> TransactionScope<S> {
    pub fn new(source: S) -> Self {
        Self { source, timeout: None }
    }

    /// Roll back and fail with `Cancelled` if the operation runs longer than `limit`
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run `operation` inside one transaction.
    ///
    /// # Errors
    ///
    /// * `Acquisition` when no transaction can be started (nothing was written)
    /// * the operation's own error, after rollback
    /// * `Cancelled` when the timeout fires, after rollback
    /// * `Commit` when every write succeeded but the commit did not
    ///
    /// A panic inside `operation` rolls back and then resumes unwinding.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut S::Tx) -> BoxFuture<'a, Result<T, StoreError>> + Send,
    {
        let mut tx = self.source.begin().await.map_err(|source| {
            tracing::error!("failed to begin transaction: {}", source);
            StoreError::Acquisition { source }
        })?;
        tracing::debug!("transaction started");

        let outcome = {
            let work = AssertUnwindSafe(operation(&mut tx)).catch_unwind();
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(done) => done,
                    Err(_) => Ok(Err(StoreError::Cancelled { after: limit })),
                },
                None => work.await,
            }
        };

        match outcome {
            Ok(Ok(value)) => match self.source.commit(tx).await {
                Ok(()) => {
                    tracing::debug!("transaction committed");
                    Ok(value)
                }
                Err(source) => {
                    tracing::error!(
                        target: "visualizer::commit",
                        "transaction commit failed, server-side outcome unknown: {}",
                        source
                    );
                    Err(StoreError::Commit { source })
                }
            },
            Ok(Err(err)) => {
                self.rollback(tx, &err.to_string()).await;
                Err(err)
            }
            Err(panic) => {
                self.rollback(tx, "operation panicked").await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn rollback(&self, tx: S::Tx, reason: &str) {
        match self.source.rollback(tx).await {
            Ok(()) => tracing::debug!(%reason, "transaction rolled back"),
            Err(e) => tracing::error!(%reason, "rollback failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::error::{EntityKind, Operation};
    use std::sync::{Arc, Mutex};

    /// In-memory stand-in: writes are staged on the handle and only published on commit
    #[derive(Clone, Default)]
    struct MemorySource {
        published: Arc<Mutex<Vec<String>>>,
        events: Arc<Mutex<Vec<&'static str>>>,
        fail_begin: bool,
        fail_commit: bool,
        fail_rollback: bool,
    }

    #[derive(Default)]
    struct MemoryTx {
        staged: Vec<String>,
    }

    impl MemorySource {
        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }

        fn published(&self) -> Vec<String> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transactional for MemorySource {
        type Tx = MemoryTx;

        async fn begin(&self) -> Result<MemoryTx, sqlx::Error> {
            if self.fail_begin {
                return Err(sqlx::Error::PoolTimedOut);
            }
            self.events.lock().unwrap().push("begin");
            Ok(MemoryTx::default())
        }

        async fn commit(&self, tx: MemoryTx) -> Result<(), sqlx::Error> {
            self.events.lock().unwrap().push("commit");
            if self.fail_commit {
                return Err(sqlx::Error::Protocol("connection reset during commit".into()));
            }
            self.published.lock().unwrap().extend(tx.staged);
            Ok(())
        }

        async fn rollback(&self, _tx: MemoryTx) -> Result<(), sqlx::Error> {
            self.events.lock().unwrap().push("rollback");
            if self.fail_rollback {
                return Err(sqlx::Error::Protocol("connection gone".into()));
            }
            Ok(())
        }
    }

    fn insert_failure() -> StoreError {
        StoreError::persistence(EntityKind::Chart, Operation::Create, sqlx::Error::RowNotFound)
    }

    #[tokio::test]
    async fn commits_once_on_success() {
        let source = MemorySource::default();
        let scope = TransactionScope::new(source.clone());

        let n = scope
            .run(|tx| {
                Box::pin(async move {
                    tx.staged.push("template".into());
                    tx.staged.push("canvas".into());
                    Ok(tx.staged.len())
                })
            })
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(source.events(), vec!["begin", "commit"]);
        assert_eq!(source.published(), vec!["template", "canvas"]);
    }

    #[tokio::test]
    async fn rolls_back_everything_on_failure() {
        let source = MemorySource::default();
        let scope = TransactionScope::new(source.clone());

        let err = scope
            .run::<(), _>(|tx| {
                Box::pin(async move {
                    tx.staged.push("template".into());
                    Err(insert_failure())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Persistence { entity: EntityKind::Chart, .. }));
        assert_eq!(source.events(), vec!["begin", "rollback"]);
        assert!(source.published().is_empty());
    }

    #[tokio::test]
    async fn rollback_failure_does_not_mask_original_error() {
        let source = MemorySource { fail_rollback: true, ..Default::default() };
        let scope = TransactionScope::new(source.clone());

        let err = scope
            .run::<(), _>(|_tx| Box::pin(async move { Err(insert_failure()) }))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Persistence { .. }));
        assert_eq!(source.events(), vec!["begin", "rollback"]);
    }

    #[tokio::test]
    async fn commit_failure_is_reported_as_commit_error() {
        let source = MemorySource { fail_commit: true, ..Default::default() };
        let scope = TransactionScope::new(source.clone());

        let err = scope
            .run(|tx| {
                Box::pin(async move {
                    tx.staged.push("template".into());
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Commit { .. }));
        assert!(source.published().is_empty());
        assert_eq!(source.events(), vec!["begin", "commit"]);
    }

    #[tokio::test]
    async fn begin_failure_is_acquisition_error_and_skips_operation() {
        let source = MemorySource { fail_begin: true, ..Default::default() };
        let scope = TransactionScope::new(source.clone());
        let called = Arc::new(Mutex::new(false));
        let flag = called.clone();

        let err = scope
            .run::<(), _>(move |_tx| {
                Box::pin(async move {
                    *flag.lock().unwrap() = true;
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Acquisition { .. }));
        assert!(!*called.lock().unwrap());
        assert!(source.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_rolls_back_and_reports_cancellation() {
        let source = MemorySource::default();
        let scope = TransactionScope::new(source.clone()).with_timeout(Duration::from_millis(50));

        let err = scope
            .run::<(), _>(|tx| {
                Box::pin(async move {
                    tx.staged.push("template".into());
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Cancelled { .. }));
        assert_eq!(source.events(), vec!["begin", "rollback"]);
        assert!(source.published().is_empty());
    }

    #[tokio::test]
    async fn panic_rolls_back_then_propagates() {
        let source = MemorySource::default();
        let scope = TransactionScope::new(source.clone());

        let handle = tokio::spawn(async move {
            scope
                .run::<(), _>(|tx| {
                    Box::pin(async move {
                        tx.staged.push("template".into());
                        if !tx.staged.is_empty() {
                            panic!("boom");
                        }
                        Ok(())
                    })
                })
                .await
        });

        let joined = handle.await;
        assert!(joined.unwrap_err().is_panic());
        assert_eq!(source.events(), vec!["begin", "rollback"]);
        assert!(source.published().is_empty());
    }
}
