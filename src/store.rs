//! Transaction Coordinator
//!
//! [`Store`] owns the connection pool. It hands out ambient query executors
//! for plain reads and runs multi-step units of work inside one database
//! transaction via [`Store::exec_tx`]. All cross-request serialisation is
//! left to PostgreSQL row locks; nothing in-process coordinates transfers.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::config::TransferConfig;
use crate::db::Database;
use crate::error::StoreError;
use crate::queries::{PgQueries, Queries};
use crate::retry::{RetryPolicy, retry_transient};
use crate::transfer::{self, OverdraftPolicy, TransferTxParams, TransferTxResult};

/// Executor on a pooled connection, outside any explicit transaction
pub type AmbientQueries = PgQueries<PoolConnection<Postgres>>;

/// Executor bound to an open transaction
pub type TxPgQueries = PgQueries<Transaction<'static, Postgres>>;

/// An executor whose statements commit or roll back together
#[async_trait]
pub trait TxQueries: Queries + Sized {
    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
impl TxQueries for TxPgQueries {
    async fn commit(self) -> Result<(), StoreError> {
        self.into_inner().commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.into_inner().rollback().await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
    overdraft: OverdraftPolicy,
    tx_timeout: Option<Duration>,
}

impl Store {
    /// Store with default transfer policy (overdraft rejected, no deadline)
    pub fn new(pool: PgPool) -> Self {
        Self::with_config(pool, &TransferConfig::default())
    }

    pub fn with_config(pool: PgPool, config: &TransferConfig) -> Self {
        Self {
            pool,
            overdraft: OverdraftPolicy::from_reject_flag(config.reject_overdraft),
            tx_timeout: config.tx_timeout(),
        }
    }

    pub fn from_database(db: &Database, config: &TransferConfig) -> Self {
        Self::with_config(db.pool().clone(), config)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn overdraft_policy(&self) -> OverdraftPolicy {
        self.overdraft
    }

    /// Ambient executor for single-statement reads and administrative CRUD
    pub async fn queries(&self) -> Result<AmbientQueries, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(PgQueries::new(conn))
    }

    /// Run `f` inside one transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// The deadline (if configured) bounds `f` only; commit is never raced
    /// against it, and it doubles as the transaction's `lock_timeout`.
    /// A rollback failure is reported alongside the original error, which
    /// stays reachable through [`StoreError::root_cause`].
    pub async fn exec_tx<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'q> FnOnce(&'q mut dyn Queries) -> BoxFuture<'q, Result<T, StoreError>> + Send,
    {
        let mut tx = self.pool.begin().await?;
        if let Some(limit) = self.tx_timeout {
            // Lock waits abort server-side too, so rollback is not stuck behind them
            sqlx::query("SELECT set_config('lock_timeout', $1, true)")
                .bind(format!("{}ms", limit.as_millis()))
                .execute(&mut *tx)
                .await?;
        }
        debug!("Transaction started");

        run_in_tx(PgQueries::new(tx), self.tx_timeout, f).await
    }

    /// Move `amount` between two accounts atomically
    pub async fn transfer_tx(
        &self,
        params: TransferTxParams,
    ) -> Result<TransferTxResult, StoreError> {
        validate(&params)?;
        let policy = self.overdraft;
        self.exec_tx(move |q| Box::pin(async move { transfer::execute(q, params, policy).await }))
            .await
    }

    /// [`Store::transfer_tx`] retried on transient failures
    pub async fn transfer_tx_with_retry(
        &self,
        params: TransferTxParams,
        policy: &RetryPolicy,
    ) -> Result<TransferTxResult, StoreError> {
        retry_transient(policy, || self.transfer_tx(params)).await
    }
}

/// Run `f` on `q`, then commit or roll back according to its outcome
pub(crate) async fn run_in_tx<Q, T, F>(
    mut q: Q,
    deadline: Option<Duration>,
    f: F,
) -> Result<T, StoreError>
where
    Q: TxQueries + 'static,
    T: Send,
    F: for<'q> FnOnce(&'q mut dyn Queries) -> BoxFuture<'q, Result<T, StoreError>> + Send,
{
    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, f(&mut q)).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout(limit)),
        },
        None => f(&mut q).await,
    };

    match outcome {
        Ok(value) => {
            q.commit()
                .await
                .map_err(|e| StoreError::Commit(Box::new(e)))?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(err) => match q.rollback().await {
            Ok(()) => {
                debug!(code = err.code(), "Transaction rolled back");
                Err(err)
            }
            Err(rb_err) => Err(StoreError::Rollback {
                source: Box::new(err),
                rollback: rb_err.to_string(),
            }),
        },
    }
}

/// Checks that need no database round-trip
pub fn validate(params: &TransferTxParams) -> Result<(), StoreError> {
    params.validate()
}
