//! Schema bootstrap

use sqlx::Executor;

use crate::Catalogue;
use crate::error::CatalogueResult;

const CREATE_ACCOUNTS: &str = "CREATE TABLE IF NOT EXISTS accounts (
	id BIGINT PRIMARY KEY,
	username TEXT NOT NULL UNIQUE,
	password_hash TEXT NOT NULL,
	created_at TEXT NOT NULL
)";

const CREATE_BOOKS: &str = "CREATE TABLE IF NOT EXISTS books (
	id BIGINT PRIMARY KEY,
	title TEXT NOT NULL,
	author TEXT NOT NULL,
	available BOOLEAN NOT NULL
)";

const CREATE_LOANS: &str = "CREATE TABLE IF NOT EXISTS loans (
	id BIGINT PRIMARY KEY,
	book_id BIGINT NOT NULL,
	account_id BIGINT NOT NULL,
	loaned_at TEXT NOT NULL,
	returned_at TEXT
)";

impl Catalogue {
	/// Create the catalogue tables. Idempotent.
	pub async fn create_schema(&self) -> CatalogueResult<()> {
		self.pool
			.run_once(|conn| {
				Box::pin(async move {
					conn.execute(sqlx::raw_sql(CREATE_ACCOUNTS)).await?;
					conn.execute(sqlx::raw_sql(CREATE_BOOKS)).await?;
					conn.execute(sqlx::raw_sql(CREATE_LOANS)).await?;
					Ok(())
				})
			})
			.await?;
		tracing::info!("catalogue schema ready");
		Ok(())
	}

	/// Drop every catalogue table. Test teardown.
	pub async fn drop_schema(&self) -> CatalogueResult<()> {
		self.pool
			.run_once(|conn| {
				Box::pin(async move {
					for table in ["loans", "books", "accounts"] {
						let sql = format!("DROP TABLE IF EXISTS {table}");
						conn.execute(sqlx::raw_sql(&sql)).await?;
					}
					Ok(())
				})
			})
			.await?;
		Ok(())
	}
}
