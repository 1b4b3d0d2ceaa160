//! Catalogue error taxonomy

use biblion_pool::PoolError;
use thiserror::Error;

/// Failures surfaced by catalogue operations.
///
/// The first three variants are action rejections: inside a multi-step
/// transaction they mean the single offending action was rolled back to
/// its savepoint while everything accumulated before it stays intact.
#[derive(Debug, Error)]
pub enum CatalogueError {
	#[error("book {0} does not exist")]
	BookNotFound(i64),

	#[error("book {0} is not available")]
	BookUnavailable(i64),

	#[error("book {0} is not on loan")]
	BookNotLoaned(i64),

	#[error("transaction {0} is unknown or already finished")]
	UnknownTransaction(i64),

	#[error("account '{0}' already exists")]
	DuplicateAccount(String),

	#[error("password hashing failed: {0}")]
	PasswordHash(String),

	#[error("malformed record: {0}")]
	MalformedRecord(String),

	#[error(transparent)]
	Pool(#[from] PoolError),
}

pub type CatalogueResult<T> = Result<T, CatalogueError>;
