//! Backend-specific statements
//!
//! The pool reaches the store through sqlx's `Any` driver, so the few
//! statements that differ per backend are keyed off the driver's runtime
//! backend name.

use std::time::Duration;

/// Build the statement that bounds how long a statement waits on a
/// row/table lock before failing, or `None` when the backend has no such
/// setting we know how to drive.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use biblion_pool::dialect::lock_wait_statement;
///
/// let sql = lock_wait_statement("SQLite", Duration::from_secs(2)).unwrap();
/// assert_eq!(sql, "PRAGMA busy_timeout = 2000");
///
/// assert!(lock_wait_statement("FoundationDB", Duration::from_secs(2)).is_none());
/// ```
pub fn lock_wait_statement(backend: &str, wait: Duration) -> Option<String> {
	match backend {
		// innodb_lock_wait_timeout has one-second granularity
		"MySQL" => Some(format!(
			"SET SESSION innodb_lock_wait_timeout = {}",
			wait.as_secs().max(1)
		)),
		"PostgreSQL" => Some(format!("SET lock_timeout = {}", wait.as_millis())),
		"SQLite" => Some(format!("PRAGMA busy_timeout = {}", wait.as_millis())),
		_ => None,
	}
}
