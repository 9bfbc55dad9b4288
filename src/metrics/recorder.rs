//! Write-side of the metrics-history subsystem: turns an observed value into
//! a raw snapshot key under the facade's `metrics:` prefix.

use metakv_store::Store;
use metakv_util::time::now;
use metakv_util::Error;

use crate::snapshot::MetricSnapshot;

/// Records one sample of `metric`, optionally scoped to `bucket`, at the
/// current wall-clock time. Cheap: a single point `put` through the raw-KV
/// facade, no read-modify-write.
pub fn record(store: &Store, metric: &str, bucket: Option<&str>, value: f64) -> Result<(), Error> {
	let snap = MetricSnapshot::new(metric, bucket.map(String::from), value, now());
	store.raw_kv().put(snap.key().as_bytes(), &snap.encode())
}

#[cfg(all(test, feature = "engine-b"))]
mod test {
	use super::*;
	use crate::test_support::test_store;

	#[test]
	fn record_writes_a_readable_snapshot() {
		let store = test_store();
		record(&store, "object_count", Some("b1"), 42.0).unwrap();
		let mut seen = Vec::new();
		store
			.raw_kv()
			.scan(crate::snapshot::snapshot_prefix().as_bytes(), b"", |k, v| {
				seen.push((k.to_vec(), v.to_vec()));
				true
			})
			.unwrap();
		assert_eq!(seen.len(), 1);
		let decoded = MetricSnapshot::decode(&seen[0].1).unwrap();
		assert_eq!(decoded.metric, "object_count");
		assert_eq!(decoded.value, 42.0);
	}
}
