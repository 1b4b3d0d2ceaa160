//! # biblion
//!
//! A small catalogue-management service: accounts, book records, and
//! multi-step borrow/return transactions over HTTP, backed by a
//! relational store.
//!
//! The interesting part lives in [`pool`]: a transactional connection
//! pool that gives each multi-step client interaction private,
//! serializable access to one physical database connection for a bounded
//! time, with a safety-net rollback reclaiming transactions whose clients
//! never come back.
//!
//! - [`pool`] — [`ConnectionPool`], [`ManagedConnection`], the timeout
//!   and error contracts.
//! - [`catalogue`] — schema bootstrap, account/book records, and the
//!   savepoint-isolated loan actions.
//! - [`server`] — the hyper HTTP surface and bearer-token registry
//!   (enabled by the `server` feature).
//!
//! ```no_run
//! use std::sync::Arc;
//! use biblion::catalogue::Catalogue;
//! use biblion::pool::ConnectionPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Arc::new(ConnectionPool::new("mysql://biblion@db.internal/catalogue"));
//! let catalogue = Catalogue::new(Arc::clone(&pool));
//! catalogue.create_schema().await?;
//!
//! let tx = pool.begin_transaction(None, None).await?;
//! let book = catalogue.add_book("Permutation City", "Greg Egan").await?;
//! catalogue.loan_book(tx, book.id, 1).await?;
//! assert!(pool.end_transaction(tx, true).await?);
//! # Ok(())
//! # }
//! ```

pub use biblion_catalogue as catalogue;
pub use biblion_pool as pool;
#[cfg(feature = "server")]
pub use biblion_server as server;

pub use biblion_catalogue::{Catalogue, CatalogueError};
pub use biblion_pool::{ConnectionPool, ManagedConnection, PoolError};
