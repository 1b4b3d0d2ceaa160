//! Pool error taxonomy

use thiserror::Error;

/// Errors surfaced by the pool and its connections.
///
/// "Transaction not found" is deliberately not an error: lookups on an
/// unknown or already-finished transaction id resolve to `Ok(None)` /
/// `Ok(false)` at the pool API. A commit that arrives after the binding's
/// timeout is likewise an ordinary `false` outcome, not an error.
#[derive(Debug, Error)]
pub enum PoolError {
	/// `bind` was called on a connection that is already bound. This is a
	/// caller bug, never retried.
	#[error("connection is already bound to transaction {transaction_id}")]
	AlreadyBound { transaction_id: i64 },

	/// A negative timeout was supplied to `bind`.
	#[error("invalid transaction timeout: {0} ms")]
	InvalidTimeout(i64),

	/// The underlying handle is gone; the connection is pending eviction.
	#[error("connection is closed")]
	ClosedConnection,

	/// Any failure from the underlying store, propagated unchanged.
	#[error(transparent)]
	Store(#[from] sqlx::Error),
}

pub type PoolResult<T> = Result<T, PoolError>;
