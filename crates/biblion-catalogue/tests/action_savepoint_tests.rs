//! Savepoint isolation inside multi-step loan transactions.
//!
//! These tests keep the pool at exactly one connection (all one-shot setup
//! happens before the transaction begins), so the post-commit probes see
//! the same SQLite database the transaction ran against.

use std::sync::Arc;

use biblion_catalogue::{Catalogue, CatalogueError};
use biblion_pool::ConnectionPool;

async fn catalogue_with_books(titles: &[&str]) -> (Catalogue, Vec<i64>) {
	let catalogue = Catalogue::new(Arc::new(ConnectionPool::new("sqlite::memory:")));
	catalogue.create_schema().await.unwrap();
	let mut ids = Vec::new();
	for title in titles {
		ids.push(catalogue.add_book(title, "Anonymous").await.unwrap().id);
	}
	(catalogue, ids)
}

#[tokio::test]
async fn accepted_action_survives_a_rejected_one() {
	let (catalogue, ids) = catalogue_with_books(&["A", "B"]).await;
	let (book_a, book_b) = (ids[0], ids[1]);

	let tx = catalogue.pool().begin_transaction(None, None).await.unwrap();

	// action A: loan book A — accepted
	catalogue.loan_book(tx, book_a, 1).await.unwrap();

	// action B: return book B, which was never loaned — rejected, rolled
	// back to its own savepoint
	let err = catalogue.return_book(tx, book_b).await.unwrap_err();
	assert!(matches!(err, CatalogueError::BookNotLoaned(id) if id == book_b));

	// the rejection did not lose action A: commit applies it
	assert!(catalogue.pool().end_transaction(tx, true).await.unwrap());

	let a = catalogue.book_by_id(book_a).await.unwrap().unwrap();
	let b = catalogue.book_by_id(book_b).await.unwrap().unwrap();
	assert!(!a.available, "loaned book must be unavailable after commit");
	assert!(b.available, "rejected action must leave book B untouched");
	catalogue.pool().close().await;
}

#[tokio::test]
async fn loaning_an_unavailable_book_is_rejected() {
	let (catalogue, ids) = catalogue_with_books(&["A"]).await;
	let book = ids[0];

	let tx = catalogue.pool().begin_transaction(None, None).await.unwrap();
	catalogue.loan_book(tx, book, 1).await.unwrap();

	// the same transaction sees its own uncommitted update
	let err = catalogue.loan_book(tx, book, 2).await.unwrap_err();
	assert!(matches!(err, CatalogueError::BookUnavailable(id) if id == book));

	assert!(catalogue.pool().end_transaction(tx, true).await.unwrap());
	catalogue.pool().close().await;
}

#[tokio::test]
async fn missing_book_is_rejected_without_poisoning_the_transaction() {
	let (catalogue, ids) = catalogue_with_books(&["A"]).await;
	let book = ids[0];

	let tx = catalogue.pool().begin_transaction(None, None).await.unwrap();

	let err = catalogue.loan_book(tx, 999_999, 1).await.unwrap_err();
	assert!(matches!(err, CatalogueError::BookNotFound(999_999)));

	// the transaction is still usable after the rejection
	catalogue.loan_book(tx, book, 1).await.unwrap();
	assert!(catalogue.pool().end_transaction(tx, true).await.unwrap());

	let a = catalogue.book_by_id(book).await.unwrap().unwrap();
	assert!(!a.available);
	catalogue.pool().close().await;
}

#[tokio::test]
async fn loan_then_return_round_trip() {
	let (catalogue, ids) = catalogue_with_books(&["A"]).await;
	let book = ids[0];

	let tx = catalogue.pool().begin_transaction(None, None).await.unwrap();
	catalogue.loan_book(tx, book, 7).await.unwrap();
	catalogue.return_book(tx, book).await.unwrap();
	assert!(catalogue.pool().end_transaction(tx, true).await.unwrap());

	let a = catalogue.book_by_id(book).await.unwrap().unwrap();
	assert!(a.available, "returned book is available again");
	catalogue.pool().close().await;
}

#[tokio::test]
async fn rollback_discards_every_action() {
	let (catalogue, ids) = catalogue_with_books(&["A"]).await;
	let book = ids[0];

	let tx = catalogue.pool().begin_transaction(None, None).await.unwrap();
	catalogue.loan_book(tx, book, 7).await.unwrap();
	assert!(!catalogue.pool().end_transaction(tx, false).await.unwrap());

	let a = catalogue.book_by_id(book).await.unwrap().unwrap();
	assert!(a.available, "rolled-back loan leaves the book available");
	catalogue.pool().close().await;
}

#[tokio::test]
async fn actions_on_an_unknown_transaction_are_refused() {
	let (catalogue, ids) = catalogue_with_books(&["A"]).await;
	let book = ids[0];

	let err = catalogue.loan_book(424_242, book, 1).await.unwrap_err();
	assert!(matches!(err, CatalogueError::UnknownTransaction(424_242)));

	let err = catalogue.return_book(424_242, book).await.unwrap_err();
	assert!(matches!(err, CatalogueError::UnknownTransaction(424_242)));
	catalogue.pool().close().await;
}
