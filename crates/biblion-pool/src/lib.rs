//! # biblion-pool
//!
//! The transactional connection pool behind the biblion catalogue service.
//!
//! The pool hands each multi-step client interaction (a "transaction")
//! private, serializable access to one physical database connection for a
//! bounded time:
//!
//! - [`ConnectionPool::run_once`] — single-shot work on a free connection.
//! - [`ConnectionPool::begin_transaction`] — bind a connection to a fresh
//!   transaction id.
//! - [`ConnectionPool::run_in_transaction`] — run more work on the bound
//!   connection, across any number of requests.
//! - [`ConnectionPool::end_transaction`] — commit or roll back; a commit
//!   that arrives after the transaction's timeout becomes a safety-net
//!   rollback, so an abandoned client cannot leave half-applied work.
//!
//! Timeouts are enforced lazily, at commit time only — there is no
//! background sweeper. An abandoned transaction therefore pins its
//! connection until someone finishes it or the pool closes; see
//! [`ConnectionPool::status`] for observing that.
//!
//! The store is reached through sqlx's `Any` driver, so the same pool runs
//! against MySQL in production and SQLite in tests.

pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod pool;

pub use config::{DEFAULT_LOCK_WAIT, DEFAULT_TRANSACTION_TIMEOUT, PoolDefaults};
pub use connection::{Binding, ManagedConnection};
pub use error::{PoolError, PoolResult};
pub use pool::{ConnectionPool, PoolStatus};
