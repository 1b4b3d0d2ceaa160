//! Opaque bearer tokens
//!
//! Tokens are UUIDs held in an in-memory map; they live as long as the
//! process. Nothing about them is a claim — resolving one is the only way
//! to learn which account it belongs to.

use dashmap::DashMap;
use uuid::Uuid;

/// In-memory token store keyed by opaque token.
#[derive(Default)]
pub struct TokenRegistry {
	tokens: DashMap<String, i64>,
}

impl TokenRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Issue a fresh token for an account.
	pub fn issue(&self, account_id: i64) -> String {
		let token = Uuid::new_v4().to_string();
		self.tokens.insert(token.clone(), account_id);
		token
	}

	/// The account a token belongs to, if the token is live.
	pub fn resolve(&self, token: &str) -> Option<i64> {
		self.tokens.get(token).map(|entry| *entry.value())
	}

	/// Invalidate a token. Returns whether it existed.
	pub fn revoke(&self, token: &str) -> bool {
		self.tokens.remove(token).is_some()
	}
}
