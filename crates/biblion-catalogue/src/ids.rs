//! Record id generation
//!
//! Record ids are generated on the application side so inserts stay
//! portable across backends with different auto-increment dialects.

use rand::RngCore;
use rand::rngs::OsRng;

/// A 63-bit non-negative record id.
pub(crate) fn fresh() -> i64 {
	(OsRng.next_u64() >> 1) as i64
}
