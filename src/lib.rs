//! Simple Bank - Ledger Transfer Engine
//!
//! Moves money between PostgreSQL-backed accounts atomically, with an
//! append-only audit trail and deadlock-free locking under concurrency.
//!
//! # Modules
//!
//! - [`models`] - Account, Entry, Transfer, User and query parameters
//! - [`queries`] - Query executor trait and its PostgreSQL implementation
//! - [`store`] - Transaction coordinator (`exec_tx`, `transfer_tx`)
//! - [`transfer`] - Transfer workflow with ordered balance updates
//! - [`retry`] - Caller-side backoff for transient failures
//! - [`error`] - Store error taxonomy
//! - [`db`] - Connection pool and schema bootstrap
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod queries;
pub mod retry;
pub mod store;
pub mod transfer;

// Convenient re-exports at crate root
pub use db::Database;
pub use error::StoreError;
pub use models::{Account, Currency, Entry, Transfer, User};
pub use queries::{PgQueries, Queries};
pub use retry::{RetryPolicy, retry_transient};
pub use store::Store;
pub use transfer::{OverdraftPolicy, TransferTxParams, TransferTxResult};
