//! Wall-clock timestamp helpers.
//!
//! All timestamps in the data model are absolute wall-clock instants with
//! nanosecond precision, represented as `chrono::DateTime<Utc>` and
//! serialized as RFC3339 strings inside each record's JSON.

use chrono::{DateTime, Utc};

pub type Timestamp = DateTime<Utc>;

/// The current wall-clock time. The one place in the crate that should call
/// `Utc::now()` directly, so that call sites read `metakv_util::time::now()`
/// and are easy to grep for if a test ever needs to stub the clock.
pub fn now() -> Timestamp {
	Utc::now()
}

/// `true` if `ts` is the zero value serde defaults an absent field to, i.e.
/// the caller never set it.
pub fn is_zero(ts: Timestamp) -> bool {
	ts == DateTime::<Utc>::default()
}

pub fn age(ts: Timestamp) -> chrono::Duration {
	now().signed_duration_since(ts)
}
