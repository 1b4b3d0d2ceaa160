//! Managed database connections
//!
//! A [`ManagedConnection`] wraps exactly one physical connection and guards
//! it against concurrent misuse: the connection is either free, bound to a
//! single logical transaction, or closed. Work may only be submitted while
//! bound, and commit/rollback always return the connection to the free
//! state (or to closed, if the handle turns out to be broken).

use std::sync::Once;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use sqlx::Connection;
use sqlx::Executor;
use sqlx::AnyConnection;
use tokio::sync::Mutex as AsyncMutex;

use crate::dialect;
use crate::error::{PoolError, PoolResult};

/// Reserved transaction id for bindings that are created and torn down
/// within a single pool call. Never handed out to callers; lookups reject
/// negative ids, so a one-shot binding cannot be reached from outside.
pub(crate) const ONE_SHOT_TRANSACTION_ID: i64 = -1;

static DRIVERS: Once = Once::new();

fn install_drivers() {
	DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// The association of a transaction id and timeout to a connection while
/// it is in use.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
	pub transaction_id: i64,
	/// Timeout in milliseconds; `0` means the binding never times out.
	pub timeout_ms: i64,
	pub bound_at: Instant,
}

impl Binding {
	fn timed_out(&self) -> bool {
		self.timeout_ms > 0
			&& self.bound_at.elapsed() > Duration::from_millis(self.timeout_ms as u64)
	}
}

#[derive(Default)]
struct Meta {
	binding: Option<Binding>,
	closed: bool,
	last_used_at: Option<Instant>,
}

/// One physical connection plus its binding state machine.
///
/// Statement execution serializes on an async mutex around the handle;
/// binding metadata lives behind a separate cheap lock so that pool scans
/// never wait for another transaction's statement to finish. Every holder
/// of the statement lock re-validates the binding, which is what makes a
/// timeout-triggered rollback and a concurrently arriving commit for the
/// same transaction id resolve deterministically.
pub struct ManagedConnection {
	meta: Mutex<Meta>,
	handle: AsyncMutex<Option<AnyConnection>>,
}

impl ManagedConnection {
	/// Open a new physical connection.
	///
	/// # Examples
	///
	/// ```
	/// use biblion_pool::ManagedConnection;
	///
	/// # async fn example() {
	/// let conn = ManagedConnection::connect("sqlite::memory:").await.unwrap();
	/// assert!(!conn.is_closed());
	/// assert_eq!(conn.bound_transaction(), None);
	/// # }
	/// # tokio::runtime::Runtime::new().unwrap().block_on(example());
	/// ```
	pub async fn connect(url: &str) -> PoolResult<Self> {
		install_drivers();
		let conn = AnyConnection::connect(url).await?;
		Ok(Self {
			meta: Mutex::new(Meta::default()),
			handle: AsyncMutex::new(Some(conn)),
		})
	}

	/// Bind this connection to a transaction and open the store-level
	/// transaction.
	///
	/// Fails with [`PoolError::AlreadyBound`] if the connection is bound,
	/// [`PoolError::InvalidTimeout`] for a negative timeout, and
	/// [`PoolError::ClosedConnection`] if the handle is gone. A timeout of
	/// `0` means the binding never times out.
	///
	/// # Examples
	///
	/// ```
	/// use biblion_pool::ManagedConnection;
	///
	/// # async fn example() {
	/// let conn = ManagedConnection::connect("sqlite::memory:").await.unwrap();
	/// conn.bind(7, 0).await.unwrap();
	/// assert_eq!(conn.bound_transaction(), Some(7));
	///
	/// // Binding twice is a caller bug
	/// assert!(conn.bind(8, 0).await.is_err());
	///
	/// assert_eq!(conn.commit(7).await.unwrap(), Some(true));
	/// assert_eq!(conn.bound_transaction(), None);
	/// # }
	/// # tokio::runtime::Runtime::new().unwrap().block_on(example());
	/// ```
	pub async fn bind(&self, transaction_id: i64, timeout_ms: i64) -> PoolResult<()> {
		if timeout_ms < 0 {
			return Err(PoolError::InvalidTimeout(timeout_ms));
		}
		{
			let mut meta = self.meta.lock();
			if meta.closed {
				return Err(PoolError::ClosedConnection);
			}
			if let Some(binding) = meta.binding {
				return Err(PoolError::AlreadyBound {
					transaction_id: binding.transaction_id,
				});
			}
			meta.binding = Some(Binding {
				transaction_id,
				timeout_ms,
				bound_at: Instant::now(),
			});
		}

		let mut handle = self.handle.lock().await;
		let Some(conn) = handle.as_mut() else {
			self.meta.lock().binding = None;
			return Err(PoolError::ClosedConnection);
		};
		if let Err(err) = conn.execute(sqlx::raw_sql("BEGIN")).await {
			self.meta.lock().binding = None;
			self.probe(&mut handle).await;
			return Err(PoolError::Store(err));
		}
		Ok(())
	}

	/// Execute caller-supplied work against the handle while bound to
	/// `transaction_id`.
	///
	/// May be called any number of times while the binding is live; this is
	/// how a multi-step transaction accumulates statements across several
	/// requests. Returns `Ok(None)` when the connection is no longer bound
	/// to `transaction_id` — the caller lost a race with a concurrent
	/// commit or rollback.
	pub async fn run_work<T, F>(&self, transaction_id: i64, work: F) -> PoolResult<Option<T>>
	where
		F: for<'c> FnOnce(&'c mut AnyConnection) -> BoxFuture<'c, sqlx::Result<T>> + Send,
		T: Send,
	{
		let mut handle = self.handle.lock().await;
		if !self.holds(transaction_id) {
			return Ok(None);
		}
		let conn = handle.as_mut().ok_or(PoolError::ClosedConnection)?;
		match work(conn).await {
			Ok(value) => Ok(Some(value)),
			Err(err) => {
				self.probe(&mut handle).await;
				Err(PoolError::Store(err))
			}
		}
	}

	/// Finish the binding for `transaction_id`.
	///
	/// Returns `Some(true)` when the store transaction committed, and
	/// `Some(false)` when the binding outlived its timeout — the store
	/// transaction is rolled back instead, so a client that never came back
	/// cannot leave half-applied work behind. Returns `None` when the
	/// connection is not (or no longer) bound to `transaction_id`.
	///
	/// The binding is cleared in every case.
	pub async fn commit(&self, transaction_id: i64) -> PoolResult<Option<bool>> {
		let mut handle = self.handle.lock().await;
		let binding = match self.meta.lock().binding {
			Some(binding) if binding.transaction_id == transaction_id => binding,
			_ => return Ok(None),
		};
		let conn = handle.as_mut().ok_or(PoolError::ClosedConnection)?;
		let settled = settle(conn, binding).await;
		self.release_binding();
		match settled {
			Ok(committed) => {
				if !committed {
					tracing::warn!(
						transaction_id,
						timeout_ms = binding.timeout_ms,
						"commit arrived after the transaction timeout; rolled back"
					);
				}
				Ok(Some(committed))
			}
			Err(err) => {
				self.probe(&mut handle).await;
				Err(PoolError::Store(err))
			}
		}
	}

	/// Unconditionally roll back the binding for `transaction_id`.
	///
	/// Returns whether the binding was held at the time of the call.
	pub async fn rollback(&self, transaction_id: i64) -> PoolResult<bool> {
		let mut handle = self.handle.lock().await;
		if !self.holds(transaction_id) {
			return Ok(false);
		}
		let conn = handle.as_mut().ok_or(PoolError::ClosedConnection)?;
		let result = conn.execute(sqlx::raw_sql("ROLLBACK")).await;
		self.release_binding();
		match result {
			Ok(_) => Ok(true),
			Err(err) => {
				self.probe(&mut handle).await;
				Err(PoolError::Store(err))
			}
		}
	}

	/// Close the underlying handle.
	///
	/// A live binding is settled first, with the same timeout check as
	/// [`ManagedConnection::commit`]. The connection is Closed afterwards
	/// even if the store reported an error on the way down.
	pub async fn close(&self) -> PoolResult<()> {
		let mut handle = self.handle.lock().await;
		let mut settle_error = None;
		let binding = self.meta.lock().binding;
		if let Some(binding) = binding {
			if let Some(conn) = handle.as_mut() {
				match settle(conn, binding).await {
					Ok(committed) => {
						if !committed {
							tracing::warn!(
								transaction_id = binding.transaction_id,
								"binding exceeded its timeout at close; rolled back"
							);
						}
					}
					Err(err) => settle_error = Some(err),
				}
			}
			self.release_binding();
		}
		let conn = handle.take();
		self.meta.lock().closed = true;
		drop(handle);
		if let Some(conn) = conn {
			if let Err(err) = conn.close().await {
				return Err(PoolError::Store(settle_error.unwrap_or(err)));
			}
		}
		match settle_error {
			Some(err) => Err(PoolError::Store(err)),
			None => Ok(()),
		}
	}

	/// Apply the store-level lock-wait setting on this connection.
	///
	/// Backends without a known lock-wait statement are skipped.
	pub(crate) async fn apply_lock_wait(&self, wait: Duration) -> PoolResult<()> {
		let mut handle = self.handle.lock().await;
		let conn = handle.as_mut().ok_or(PoolError::ClosedConnection)?;
		let backend = conn.backend_name();
		match dialect::lock_wait_statement(backend, wait) {
			Some(sql) => {
				conn.execute(sqlx::raw_sql(&sql)).await?;
			}
			None => {
				tracing::debug!(backend, "no lock-wait statement for this backend");
			}
		}
		Ok(())
	}

	pub fn is_closed(&self) -> bool {
		self.meta.lock().closed
	}

	/// The transaction id this connection is currently bound to, if any.
	pub fn bound_transaction(&self) -> Option<i64> {
		self.meta.lock().binding.map(|b| b.transaction_id)
	}

	/// When this connection last returned to the free state. Idle-reclaim
	/// bookkeeping only; nothing in the pool acts on it.
	pub fn last_used_at(&self) -> Option<Instant> {
		self.meta.lock().last_used_at
	}

	fn holds(&self, transaction_id: i64) -> bool {
		matches!(
			self.meta.lock().binding,
			Some(binding) if binding.transaction_id == transaction_id
		)
	}

	fn release_binding(&self) {
		let mut meta = self.meta.lock();
		meta.binding = None;
		meta.last_used_at = Some(Instant::now());
	}

	/// After a store error, check whether the handle is still alive and
	/// flip to Closed if it is not, so the pool can evict this connection.
	async fn probe(&self, slot: &mut Option<AnyConnection>) {
		let dead = match slot.as_mut() {
			Some(conn) => conn.ping().await.is_err(),
			None => true,
		};
		if dead {
			if let Some(conn) = slot.take() {
				let _ = conn.close().await;
			}
			self.meta.lock().closed = true;
		}
	}
}

/// Commit the binding's store transaction, or roll it back when the
/// binding outlived its timeout. Returns whether a commit happened.
async fn settle(conn: &mut AnyConnection, binding: Binding) -> sqlx::Result<bool> {
	let timed_out = binding.timed_out();
	let statement = if timed_out { "ROLLBACK" } else { "COMMIT" };
	conn.execute(sqlx::raw_sql(statement)).await?;
	Ok(!timed_out)
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn sqlite() -> ManagedConnection {
		ManagedConnection::connect("sqlite::memory:")
			.await
			.expect("in-memory sqlite should open")
	}

	#[tokio::test]
	async fn bind_rejects_negative_timeout() {
		let conn = sqlite().await;
		let err = conn.bind(1, -5).await.unwrap_err();
		assert!(matches!(err, PoolError::InvalidTimeout(-5)));
		assert_eq!(conn.bound_transaction(), None);
	}

	#[tokio::test]
	async fn bind_rejects_double_binding() {
		let conn = sqlite().await;
		conn.bind(1, 0).await.unwrap();
		let err = conn.bind(2, 0).await.unwrap_err();
		assert!(matches!(err, PoolError::AlreadyBound { transaction_id: 1 }));
	}

	#[tokio::test]
	async fn bind_rejects_closed_connection() {
		let conn = sqlite().await;
		conn.close().await.unwrap();
		let err = conn.bind(1, 0).await.unwrap_err();
		assert!(matches!(err, PoolError::ClosedConnection));
	}

	#[tokio::test]
	async fn commit_within_timeout_reports_true() {
		let conn = sqlite().await;
		conn.bind(1, 60_000).await.unwrap();
		assert_eq!(conn.commit(1).await.unwrap(), Some(true));
		assert!(conn.last_used_at().is_some());
	}

	#[tokio::test]
	async fn commit_after_timeout_rolls_back() {
		let conn = sqlite().await;
		conn.bind(1, 50).await.unwrap();
		tokio::time::sleep(Duration::from_millis(120)).await;
		assert_eq!(conn.commit(1).await.unwrap(), Some(false));
		assert_eq!(conn.bound_transaction(), None);
	}

	#[tokio::test]
	async fn zero_timeout_never_times_out() {
		let conn = sqlite().await;
		conn.bind(1, 0).await.unwrap();
		tokio::time::sleep(Duration::from_millis(80)).await;
		assert_eq!(conn.commit(1).await.unwrap(), Some(true));
	}

	#[tokio::test]
	async fn commit_for_other_transaction_is_none() {
		let conn = sqlite().await;
		conn.bind(1, 0).await.unwrap();
		assert_eq!(conn.commit(2).await.unwrap(), None);
		// the original binding is untouched
		assert_eq!(conn.bound_transaction(), Some(1));
	}

	#[tokio::test]
	async fn rollback_clears_binding() {
		let conn = sqlite().await;
		conn.bind(1, 0).await.unwrap();
		assert!(conn.rollback(1).await.unwrap());
		assert_eq!(conn.bound_transaction(), None);
		assert!(!conn.rollback(1).await.unwrap());
	}

	#[tokio::test]
	async fn work_runs_only_under_matching_binding() {
		let conn = sqlite().await;
		conn.bind(1, 0).await.unwrap();

		let value = conn
			.run_work(1, |conn| {
				Box::pin(async move {
					sqlx::query_scalar::<_, i64>("SELECT 40 + 2")
						.fetch_one(&mut *conn)
						.await
				})
			})
			.await
			.unwrap();
		assert_eq!(value, Some(42));

		let missed = conn
			.run_work(9, |conn| {
				Box::pin(async move {
					sqlx::query_scalar::<_, i64>("SELECT 1")
						.fetch_one(&mut *conn)
						.await
				})
			})
			.await
			.unwrap();
		assert_eq!(missed, None);
	}

	#[tokio::test]
	async fn work_visible_across_calls_until_rollback() {
		let conn = sqlite().await;
		conn.bind(1, 0).await.unwrap();
		conn.run_work(1, |conn| {
			Box::pin(async move {
				sqlx::query("CREATE TABLE t (n INTEGER)")
					.execute(&mut *conn)
					.await?;
				sqlx::query("INSERT INTO t (n) VALUES (1)")
					.execute(&mut *conn)
					.await
					.map(|_| ())
			})
		})
		.await
		.unwrap();

		let count = conn
			.run_work(1, |conn| {
				Box::pin(async move {
					sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM t")
						.fetch_one(&mut *conn)
						.await
				})
			})
			.await
			.unwrap();
		assert_eq!(count, Some(1));

		assert!(conn.rollback(1).await.unwrap());
		conn.bind(2, 0).await.unwrap();
		let rows = conn
			.run_work(2, |conn| {
				Box::pin(async move {
					sqlx::query("SELECT COUNT(*) FROM t")
						.fetch_all(&mut *conn)
						.await
				})
			})
			.await;
		// the table itself was rolled back with the first transaction
		assert!(rows.is_err());
	}

	#[tokio::test]
	async fn close_settles_live_binding_first() {
		let conn = sqlite().await;
		conn.bind(1, 0).await.unwrap();
		conn.close().await.unwrap();
		assert!(conn.is_closed());
		assert_eq!(conn.bound_transaction(), None);
	}
}
