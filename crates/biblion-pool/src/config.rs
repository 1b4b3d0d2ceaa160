//! Pool defaults

use std::time::Duration;

/// Built-in default transaction timeout applied when `begin_transaction`
/// is called without an override.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Built-in default store-level lock-wait timeout.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(10);

/// Runtime-mutable pool defaults.
///
/// Both values can be changed while the pool is running and reset to the
/// built-ins; `ConnectionPool::close` also resets them.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use biblion_pool::PoolDefaults;
///
/// let defaults = PoolDefaults::new().with_transaction_timeout(Duration::from_secs(5));
/// assert_eq!(defaults.transaction_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDefaults {
	/// Fallback timeout for transactions begun without an explicit one.
	pub transaction_timeout: Duration,
	/// Store-level lock-wait setting applied when a transaction begins;
	/// `None` leaves the store's own default in place.
	pub lock_wait: Option<Duration>,
}

impl Default for PoolDefaults {
	fn default() -> Self {
		Self {
			transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
			lock_wait: Some(DEFAULT_LOCK_WAIT),
		}
	}
}

impl PoolDefaults {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
		self.transaction_timeout = timeout;
		self
	}

	pub fn with_lock_wait(mut self, wait: Option<Duration>) -> Self {
		self.lock_wait = wait;
		self
	}
}
