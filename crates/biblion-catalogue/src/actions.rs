//! Savepoint-isolated loan actions
//!
//! Each action runs on the transaction's bound connection behind its own
//! savepoint. A rejected action (missing book, wrong availability state)
//! rolls back to that savepoint only: the actions accumulated earlier in
//! the same transaction stay intact and uncommitted, so a client can have
//! some actions accepted and others refused without losing prior work.

use chrono::Utc;
use sqlx::AnyConnection;
use sqlx::Executor;

use crate::error::{CatalogueError, CatalogueResult};
use crate::models::Loan;
use crate::{Catalogue, ids};

impl Catalogue {
	/// Mark a book unavailable and record the loan, inside the given
	/// transaction.
	///
	/// Rejections: [`CatalogueError::BookNotFound`] when the book does not
	/// exist, [`CatalogueError::BookUnavailable`] when it is already out.
	/// [`CatalogueError::UnknownTransaction`] means the transaction id is
	/// not bound to any connection.
	pub async fn loan_book(
		&self,
		transaction_id: i64,
		book_id: i64,
		account_id: i64,
	) -> CatalogueResult<Loan> {
		let savepoint = self.next_savepoint();
		let outcome = self
			.pool
			.run_in_transaction(transaction_id, move |conn| {
				Box::pin(async move {
					conn.execute(sqlx::raw_sql(&format!("SAVEPOINT {savepoint}")))
						.await?;
					let step = loan_step(&mut *conn, book_id, account_id).await;
					finish_savepoint(conn, &savepoint, step).await
				})
			})
			.await?;

		match outcome {
			None => Err(CatalogueError::UnknownTransaction(transaction_id)),
			Some(Ok(loan)) => {
				tracing::debug!(transaction_id, book_id, loan = loan.id, "book loaned");
				Ok(loan)
			}
			Some(Err(rejection)) => Err(rejection),
		}
	}

	/// Close the open loan for a book and mark it available again, inside
	/// the given transaction.
	///
	/// Rejections: [`CatalogueError::BookNotFound`] when the book does not
	/// exist, [`CatalogueError::BookNotLoaned`] when it has no open loan.
	pub async fn return_book(&self, transaction_id: i64, book_id: i64) -> CatalogueResult<()> {
		let savepoint = self.next_savepoint();
		let outcome = self
			.pool
			.run_in_transaction(transaction_id, move |conn| {
				Box::pin(async move {
					conn.execute(sqlx::raw_sql(&format!("SAVEPOINT {savepoint}")))
						.await?;
					let step = return_step(&mut *conn, book_id).await;
					finish_savepoint(conn, &savepoint, step).await
				})
			})
			.await?;

		match outcome {
			None => Err(CatalogueError::UnknownTransaction(transaction_id)),
			Some(Ok(())) => {
				tracing::debug!(transaction_id, book_id, "book returned");
				Ok(())
			}
			Some(Err(rejection)) => Err(rejection),
		}
	}
}

async fn loan_step(
	conn: &mut AnyConnection,
	book_id: i64,
	account_id: i64,
) -> sqlx::Result<Result<Loan, CatalogueError>> {
	let available: Option<i64> =
		sqlx::query_scalar("SELECT available FROM books WHERE id = ?")
			.bind(book_id)
			.fetch_optional(&mut *conn)
			.await?;
	match available {
		None => Ok(Err(CatalogueError::BookNotFound(book_id))),
		Some(0) => Ok(Err(CatalogueError::BookUnavailable(book_id))),
		Some(_) => {
			sqlx::query("UPDATE books SET available = ? WHERE id = ?")
				.bind(0_i64)
				.bind(book_id)
				.execute(&mut *conn)
				.await?;
			let loan = Loan {
				id: ids::fresh(),
				book_id,
				account_id,
				loaned_at: Utc::now(),
				returned_at: None,
			};
			sqlx::query(
				"INSERT INTO loans (id, book_id, account_id, loaned_at, returned_at) \
				 VALUES (?, ?, ?, ?, ?)",
			)
			.bind(loan.id)
			.bind(loan.book_id)
			.bind(loan.account_id)
			.bind(loan.loaned_at.to_rfc3339())
			.bind(Option::<String>::None)
			.execute(&mut *conn)
			.await?;
			Ok(Ok(loan))
		}
	}
}

async fn return_step(
	conn: &mut AnyConnection,
	book_id: i64,
) -> sqlx::Result<Result<(), CatalogueError>> {
	let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM books WHERE id = ?")
		.bind(book_id)
		.fetch_optional(&mut *conn)
		.await?;
	if exists.is_none() {
		return Ok(Err(CatalogueError::BookNotFound(book_id)));
	}

	let open_loan: Option<i64> = sqlx::query_scalar(
		"SELECT id FROM loans WHERE book_id = ? AND returned_at IS NULL",
	)
	.bind(book_id)
	.fetch_optional(&mut *conn)
	.await?;
	let Some(loan_id) = open_loan else {
		return Ok(Err(CatalogueError::BookNotLoaned(book_id)));
	};

	sqlx::query("UPDATE loans SET returned_at = ? WHERE id = ?")
		.bind(Utc::now().to_rfc3339())
		.bind(loan_id)
		.execute(&mut *conn)
		.await?;
	sqlx::query("UPDATE books SET available = ? WHERE id = ?")
		.bind(1_i64)
		.bind(book_id)
		.execute(&mut *conn)
		.await?;
	Ok(Ok(()))
}

/// Release the savepoint on success; roll back to it when the action was
/// rejected or one of its statements failed.
async fn finish_savepoint<T>(
	conn: &mut AnyConnection,
	savepoint: &str,
	step: sqlx::Result<Result<T, CatalogueError>>,
) -> sqlx::Result<Result<T, CatalogueError>> {
	match step {
		Ok(Ok(value)) => {
			conn.execute(sqlx::raw_sql(&format!("RELEASE SAVEPOINT {savepoint}")))
				.await?;
			Ok(Ok(value))
		}
		Ok(Err(rejection)) => {
			conn.execute(sqlx::raw_sql(&format!("ROLLBACK TO SAVEPOINT {savepoint}")))
				.await?;
			Ok(Err(rejection))
		}
		Err(err) => {
			let _ = conn
				.execute(sqlx::raw_sql(&format!("ROLLBACK TO SAVEPOINT {savepoint}")))
				.await;
			Err(err)
		}
	}
}
