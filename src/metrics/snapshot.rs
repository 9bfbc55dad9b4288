//! Wire format and key encoding for the metrics-history subsystem.
//!
//! Every key this module produces lives under the raw-KV facade's
//! `metrics:` prefix, so it never collides with an entity-store
//! key: the facade is the only thing this crate touches, it never decodes
//! `BucketMetadata`/`ObjectMetadata`/etc.
//!
//! Two record shapes share the prefix:
//!
//! - `metrics:snap:<metric>:<bucket|->:<timestampNanos>` — a single raw
//!   sample, written whenever a caller observes a value worth recording.
//! - `metrics:hourly:<metric>:<bucket|->:<hourEpoch>` — an hourly average
//!   produced by [`crate::aggregator`] once the raw samples it was built from
//!   are older than the retention window.
//!
//! Both keys embed a fixed-width, zero-padded timestamp so that a prefix scan
//! returns samples in chronological order without needing to decode the
//! value first.

use metakv_util::time::Timestamp;
use serde::{Deserialize, Serialize};

const SNAP_PREFIX: &str = "metrics:snap:";
const HOURLY_PREFIX: &str = "metrics:hourly:";

/// Width a `u64` nanosecond or hour-epoch timestamp is zero-padded to, wide
/// enough for any value before the year 5138.
const TS_WIDTH: usize = 20;

fn bucket_segment(bucket: Option<&str>) -> &str {
	bucket.unwrap_or("-")
}

/// A single observed value for `metric`, optionally scoped to one bucket.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricSnapshot {
	pub metric: String,
	pub bucket: Option<String>,
	pub value: f64,
	pub timestamp: Timestamp,
}

impl MetricSnapshot {
	pub fn new(metric: impl Into<String>, bucket: Option<String>, value: f64, timestamp: Timestamp) -> Self {
		MetricSnapshot { metric: metric.into(), bucket, value, timestamp }
	}

	pub fn key(&self) -> String {
		snapshot_key(&self.metric, self.bucket.as_deref(), self.timestamp)
	}

	pub fn encode(&self) -> Vec<u8> {
		serde_json::to_vec(self).expect("MetricSnapshot serialization is infallible")
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, metakv_util::Error> {
		serde_json::from_slice(bytes).map_err(|e| metakv_util::Error::Message(format!("corrupt metric snapshot: {}", e)))
	}
}

/// An hourly average of however many raw snapshots fell inside `hour_start`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HourlyAggregate {
	pub metric: String,
	pub bucket: Option<String>,
	pub hour_start: Timestamp,
	pub average: f64,
	pub sample_count: u64,
}

impl HourlyAggregate {
	pub fn key(&self) -> String {
		hourly_key(&self.metric, self.bucket.as_deref(), self.hour_start)
	}

	pub fn encode(&self) -> Vec<u8> {
		serde_json::to_vec(self).expect("HourlyAggregate serialization is infallible")
	}
}

pub fn snapshot_key(metric: &str, bucket: Option<&str>, ts: Timestamp) -> String {
	format!(
		"{}{}:{}:{:0width$}",
		SNAP_PREFIX,
		metric,
		bucket_segment(bucket),
		ts.timestamp_nanos_opt().unwrap_or(0).max(0) as u64,
		width = TS_WIDTH,
	)
}

pub fn snapshot_prefix() -> &'static str {
	SNAP_PREFIX
}

pub fn hourly_key(metric: &str, bucket: Option<&str>, hour_start: Timestamp) -> String {
	format!(
		"{}{}:{}:{:0width$}",
		HOURLY_PREFIX,
		metric,
		bucket_segment(bucket),
		hour_epoch(hour_start),
		width = TS_WIDTH,
	)
}

/// The hour a timestamp falls into, truncated down to the start of its hour
/// and expressed as seconds since the epoch (always non-negative for any
/// timestamp after 1970).
pub fn hour_epoch(ts: Timestamp) -> u64 {
	let secs = ts.timestamp().max(0) as u64;
	(secs / 3600) * 3600
}

/// The start-of-hour `Timestamp` that `hour_epoch` groups `ts` into.
pub fn hour_start(ts: Timestamp) -> Timestamp {
	use chrono::{TimeZone, Utc};
	Utc.timestamp_opt(hour_epoch(ts) as i64, 0).single().unwrap_or(ts)
}

#[cfg(test)]
mod test {
	use super::*;
	use chrono::{TimeZone, Utc};

	fn ts(secs: i64) -> Timestamp {
		Utc.timestamp_opt(secs, 0).single().unwrap()
	}

	#[test]
	fn snapshot_keys_sort_chronologically() {
		let k1 = snapshot_key("requests", Some("b1"), ts(100));
		let k2 = snapshot_key("requests", Some("b1"), ts(200));
		assert!(k1 < k2);
	}

	#[test]
	fn hour_epoch_truncates_to_the_hour() {
		assert_eq!(hour_epoch(ts(3700)), 3600);
		assert_eq!(hour_epoch(ts(7199)), 3600);
		assert_eq!(hour_epoch(ts(7200)), 7200);
	}

	#[test]
	fn bucket_segment_distinguishes_global_metrics() {
		let k1 = snapshot_key("requests", None, ts(100));
		let k2 = snapshot_key("requests", Some("b1"), ts(100));
		assert_ne!(k1, k2);
		assert!(k1.contains(":-:"));
	}
}
