//! # biblion-catalogue
//!
//! The catalogue domain: accounts, book records, and the multi-step
//! borrow/return actions. Single-shot operations go through
//! [`ConnectionPool::run_once`]; the loan actions run inside a bound
//! transaction through [`ConnectionPool::run_in_transaction`], each one
//! isolated behind its own savepoint so a rejected action never disturbs
//! the work accumulated before it.
//!
//! [`ConnectionPool::run_once`]: biblion_pool::ConnectionPool::run_once
//! [`ConnectionPool::run_in_transaction`]: biblion_pool::ConnectionPool::run_in_transaction

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use biblion_pool::ConnectionPool;

mod accounts;
mod actions;
mod books;
pub mod error;
mod ids;
pub mod models;
mod schema;

pub use error::{CatalogueError, CatalogueResult};
pub use models::{Account, Book, Loan};

/// The catalogue service: a thin domain layer over the transactional pool.
///
/// Construct one per pool; it owns no state beyond a savepoint counter,
/// so it is cheap to share behind an `Arc`.
pub struct Catalogue {
	pool: Arc<ConnectionPool>,
	savepoint_seq: AtomicU64,
}

impl Catalogue {
	pub fn new(pool: Arc<ConnectionPool>) -> Self {
		Self {
			pool,
			savepoint_seq: AtomicU64::new(0),
		}
	}

	/// The pool this catalogue runs on.
	pub fn pool(&self) -> &Arc<ConnectionPool> {
		&self.pool
	}

	/// Savepoint names only need to be unique within a connection's live
	/// transaction; a process-wide counter more than covers that.
	fn next_savepoint(&self) -> String {
		let seq = self.savepoint_seq.fetch_add(1, Ordering::Relaxed) + 1;
		format!("sp_{}", seq)
	}
}
