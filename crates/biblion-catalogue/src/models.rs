//! Catalogue records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatalogueError;

/// A registered account. The password hash never leaves the store layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
	pub id: i64,
	pub username: String,
	pub created_at: DateTime<Utc>,
}

/// A book record in the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
	pub id: i64,
	pub title: String,
	pub author: String,
	pub available: bool,
}

/// One borrow of one book by one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
	pub id: i64,
	pub book_id: i64,
	pub account_id: i64,
	pub loaned_at: DateTime<Utc>,
	pub returned_at: Option<DateTime<Utc>>,
}

/// Timestamps are stored as RFC 3339 text so the same schema works on
/// every backend the `Any` driver reaches.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CatalogueError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|err| CatalogueError::MalformedRecord(format!("bad timestamp '{value}': {err}")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn timestamps_round_trip_through_rfc3339() {
		let now = Utc::now();
		let parsed = parse_timestamp(&now.to_rfc3339()).unwrap();
		assert_eq!(parsed, now);
	}

	#[rstest]
	#[case("yesterday-ish")]
	#[case("")]
	#[case("2026-13-40T99:00:00Z")]
	fn garbage_timestamps_are_rejected(#[case] value: &str) {
		assert!(matches!(
			parse_timestamp(value),
			Err(CatalogueError::MalformedRecord(_))
		));
	}
}
