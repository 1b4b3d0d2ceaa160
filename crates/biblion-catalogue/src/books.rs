//! Book records: one-shot insert and search

use sqlx::Row;
use sqlx::any::AnyRow;

use crate::error::CatalogueResult;
use crate::models::Book;
use crate::{Catalogue, ids};

fn book_from_row(row: &AnyRow) -> sqlx::Result<Book> {
	Ok(Book {
		id: row.try_get("id")?,
		title: row.try_get("title")?,
		author: row.try_get("author")?,
		// stored as 0/1; BOOLEAN is not a real type on every backend
		available: row.try_get::<i64, _>("available")? != 0,
	})
}

impl Catalogue {
	/// Add a book to the catalogue. New books start out available.
	pub async fn add_book(&self, title: &str, author: &str) -> CatalogueResult<Book> {
		let book = Book {
			id: ids::fresh(),
			title: title.to_string(),
			author: author.to_string(),
			available: true,
		};
		let inserted = book.clone();
		self.pool
			.run_once(move |conn| {
				Box::pin(async move {
					sqlx::query(
						"INSERT INTO books (id, title, author, available) VALUES (?, ?, ?, ?)",
					)
					.bind(inserted.id)
					.bind(&inserted.title)
					.bind(&inserted.author)
					.bind(inserted.available as i64)
					.execute(&mut *conn)
					.await
					.map(|_| ())
				})
			})
			.await?;
		Ok(book)
	}

	/// Fetch a single book by id.
	pub async fn book_by_id(&self, book_id: i64) -> CatalogueResult<Option<Book>> {
		let book = self
			.pool
			.run_once(move |conn| {
				Box::pin(async move {
					sqlx::query("SELECT id, title, author, available FROM books WHERE id = ?")
						.bind(book_id)
						.fetch_optional(&mut *conn)
						.await?
						.as_ref()
						.map(book_from_row)
						.transpose()
				})
			})
			.await?;
		Ok(book)
	}

	/// Search books by title and/or author substring. No filters returns
	/// the whole catalogue.
	pub async fn search_books(
		&self,
		title: Option<&str>,
		author: Option<&str>,
	) -> CatalogueResult<Vec<Book>> {
		let title = title.map(|t| format!("%{t}%"));
		let author = author.map(|a| format!("%{a}%"));

		let books = self
			.pool
			.run_once(move |conn| {
				Box::pin(async move {
					let mut sql =
						String::from("SELECT id, title, author, available FROM books");
					let mut clauses = Vec::new();
					if title.is_some() {
						clauses.push("title LIKE ?");
					}
					if author.is_some() {
						clauses.push("author LIKE ?");
					}
					if !clauses.is_empty() {
						sql.push_str(" WHERE ");
						sql.push_str(&clauses.join(" AND "));
					}
					sql.push_str(" ORDER BY title, author");

					let mut query = sqlx::query(&sql);
					if let Some(ref pattern) = title {
						query = query.bind(pattern);
					}
					if let Some(ref pattern) = author {
						query = query.bind(pattern);
					}

					let rows = query.fetch_all(&mut *conn).await?;
					rows.iter().map(book_from_row).collect()
				})
			})
			.await?;
		Ok(books)
	}
}
