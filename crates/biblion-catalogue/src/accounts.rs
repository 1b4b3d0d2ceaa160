//! Account registration and credential checks

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sqlx::Row;

use crate::error::{CatalogueError, CatalogueResult};
use crate::models::{Account, parse_timestamp};
use crate::{Catalogue, ids};

struct AccountRow {
	id: i64,
	username: String,
	password_hash: String,
	created_at: String,
}

impl Catalogue {
	/// Register a new account. The password is stored as an argon2 hash.
	pub async fn register_account(
		&self,
		username: &str,
		password: &str,
	) -> CatalogueResult<Account> {
		let salt = SaltString::generate(&mut OsRng);
		let password_hash = Argon2::default()
			.hash_password(password.as_bytes(), &salt)
			.map_err(|err| CatalogueError::PasswordHash(err.to_string()))?
			.to_string();

		let id = ids::fresh();
		let username_owned = username.to_string();
		let created_at = Utc::now();

		let inserted = self
			.pool
			.run_once(move |conn| {
				Box::pin(async move {
					let taken: Option<i64> =
						sqlx::query_scalar("SELECT id FROM accounts WHERE username = ?")
							.bind(&username_owned)
							.fetch_optional(&mut *conn)
							.await?;
					if taken.is_some() {
						return Ok(None);
					}
					sqlx::query(
						"INSERT INTO accounts (id, username, password_hash, created_at) \
						 VALUES (?, ?, ?, ?)",
					)
					.bind(id)
					.bind(&username_owned)
					.bind(&password_hash)
					.bind(created_at.to_rfc3339())
					.execute(&mut *conn)
					.await?;
					Ok(Some(()))
				})
			})
			.await?;

		match inserted {
			Some(()) => {
				tracing::info!(account = id, "account registered");
				Ok(Account {
					id,
					username: username.to_string(),
					created_at,
				})
			}
			None => Err(CatalogueError::DuplicateAccount(username.to_string())),
		}
	}

	/// Check a username/password pair; `Ok(None)` means the credentials do
	/// not match any account.
	pub async fn authenticate(
		&self,
		username: &str,
		password: &str,
	) -> CatalogueResult<Option<Account>> {
		let username_owned = username.to_string();
		let row = self
			.pool
			.run_once(move |conn| {
				Box::pin(async move {
					let row = sqlx::query(
						"SELECT id, username, password_hash, created_at \
						 FROM accounts WHERE username = ?",
					)
					.bind(&username_owned)
					.fetch_optional(&mut *conn)
					.await?;
					row.map(|row| {
						Ok(AccountRow {
							id: row.try_get("id")?,
							username: row.try_get("username")?,
							password_hash: row.try_get("password_hash")?,
							created_at: row.try_get("created_at")?,
						})
					})
					.transpose()
				})
			})
			.await?;

		let Some(row) = row else {
			return Ok(None);
		};

		let parsed = PasswordHash::new(&row.password_hash)
			.map_err(|err| CatalogueError::PasswordHash(err.to_string()))?;
		if Argon2::default()
			.verify_password(password.as_bytes(), &parsed)
			.is_err()
		{
			return Ok(None);
		}

		Ok(Some(Account {
			id: row.id,
			username: row.username,
			created_at: parse_timestamp(&row.created_at)?,
		}))
	}
}
