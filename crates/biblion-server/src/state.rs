//! Shared application state

use dashmap::DashMap;

use biblion_catalogue::Catalogue;

use crate::auth::TokenRegistry;

/// Per-transaction bookkeeping held by the server: who opened it, and how
/// many actions it has accepted so far. The pool owns the binding itself;
/// this record only exists between begin and commit/rollback.
#[derive(Debug, Clone, Copy)]
pub struct TransactionSession {
	pub account_id: i64,
	pub actions_applied: u32,
}

/// Everything the handlers share.
pub struct AppState {
	pub catalogue: Catalogue,
	pub tokens: TokenRegistry,
	pub sessions: DashMap<i64, TransactionSession>,
}

impl AppState {
	pub fn new(catalogue: Catalogue) -> Self {
		Self {
			catalogue,
			tokens: TokenRegistry::new(),
			sessions: DashMap::new(),
		}
	}
}
