//! The metrics aggregator: hourly, collects raw
//! snapshot records older than the retention window into hourly averages and
//! deletes the raw samples in a single batch. Spawned as an independent
//! `tokio` task the same way `metakv_store::workers` spawns the TTL reaper
//! and value-log GC ticker: a `tokio::time::interval` selected against a
//! shared shutdown signal, missed ticks skipped rather than bursted, no lock
//! held across the wait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metakv_store::Store;
use metakv_util::background::ShutdownSignal;
use metakv_util::time;

use crate::snapshot::{self, HourlyAggregate, MetricSnapshot};

/// Tunables for the aggregator. Not part of `metakv_util::config::StoreConfig`
/// since the metrics-history subsystem is an optional consumer of the store,
/// not the store itself: it only depends on the raw-KV facade, never on
/// entity-store internals.
#[derive(Clone, Debug)]
pub struct AggregatorConfig {
	pub tick_interval_secs: u64,
	pub retention_days: i64,
}

impl Default for AggregatorConfig {
	fn default() -> Self {
		AggregatorConfig { tick_interval_secs: 3600, retention_days: 7 }
	}
}

/// Spawns the aggregator ticker. Returns a handle the caller should `abort()`
/// at shutdown, the same lifecycle `metakv_store::workers::WorkerHandles`
/// gives its own tasks.
pub fn spawn(store: Arc<Store>, mut shutdown: ShutdownSignal, config: AggregatorConfig) -> tokio::task::JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(Duration::from_secs(config.tick_interval_secs));
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		loop {
			tokio::select! {
				_ = ticker.tick() => {}
				_ = shutdown.wait() => {
					info!("Metrics aggregator shutting down");
					return;
				}
			}
			if let Err(e) = run_once(&store, &config) {
				error!("Metrics aggregator tick failed, will retry next interval: {}", e);
			}
		}
	})
}

/// One aggregation pass: scans every raw snapshot, buckets the ones older
/// than `retention_days` by `(metric, bucket, hour)`, merges each bucket into
/// its (possibly pre-existing) hourly aggregate, and atomically swaps the raw
/// samples out for the updated aggregates.
pub fn run_once(store: &Store, config: &AggregatorConfig) -> Result<usize, metakv_util::Error> {
	let cutoff = time::now() - chrono::Duration::days(config.retention_days);
	let kv = store.raw_kv();

	let mut stale: Vec<(Vec<u8>, MetricSnapshot)> = Vec::new();
	kv.scan(snapshot::snapshot_prefix().as_bytes(), b"", |k, v| {
		if let Ok(snap) = MetricSnapshot::decode(v) {
			if snap.timestamp < cutoff {
				stale.push((k.to_vec(), snap));
			}
		}
		true
	})?;

	if stale.is_empty() {
		return Ok(0);
	}

	// (metric, bucket, hour_start) -> (sum, count)
	let mut groups: HashMap<(String, Option<String>, i64), (f64, u64)> = HashMap::new();
	for (_, snap) in &stale {
		let hour = snapshot::hour_start(snap.timestamp);
		let entry = groups.entry((snap.metric.clone(), snap.bucket.clone(), hour.timestamp())).or_insert((0.0, 0));
		entry.0 += snap.value;
		entry.1 += 1;
	}

	let mut sets = Vec::new();
	for ((metric, bucket, hour_epoch), (sum, count)) in groups {
		use chrono::TimeZone;
		let hour = chrono::Utc
			.timestamp_opt(hour_epoch, 0)
			.single()
			.expect("hour_epoch was derived from a valid Timestamp");

		let key = snapshot::hourly_key(&metric, bucket.as_deref(), hour);
		let (sum, count) = match kv.get(key.as_bytes()) {
			Ok(existing) => {
				let prev: HourlyAggregate = serde_json::from_slice(&existing)
					.map_err(|e| metakv_util::Error::Message(format!("corrupt hourly aggregate: {}", e)))?;
				(sum + prev.average * prev.sample_count as f64, count + prev.sample_count)
			}
			Err(metakv_util::Error::NotFound(_)) => (sum, count),
			Err(e) => return Err(e),
		};

		let aggregate = HourlyAggregate { metric, bucket, hour_start: hour, average: sum / count as f64, sample_count: count };
		sets.push((key.into_bytes(), aggregate.encode()));
	}

	let deletes: Vec<Vec<u8>> = stale.into_iter().map(|(k, _)| k).collect();
	let reclaimed = deletes.len();
	kv.batch(&sets, &deletes)?;

	info!("Metrics aggregator folded {} stale sample(s) into {} hourly aggregate(s)", reclaimed, sets.len());
	Ok(reclaimed)
}

#[cfg(all(test, feature = "engine-b"))]
mod test {
	use super::*;
	use crate::recorder::record;
	use crate::test_support::test_store;
	use metakv_util::time::now;

	#[test]
	fn stale_samples_are_folded_and_removed() {
		let store = test_store();
		// Backdate the snapshot directly, bypassing `record`'s "now" timestamp,
		// so the test doesn't depend on `retention_days` being tiny.
		let old = now() - chrono::Duration::days(10);
		let snap = MetricSnapshot::new("object_count", Some("b1"), 10.0, old);
		store.raw_kv().put(snap.key().as_bytes(), &snap.encode()).unwrap();
		let snap2 = MetricSnapshot::new("object_count", Some("b1"), 20.0, old + chrono::Duration::minutes(1));
		store.raw_kv().put(snap2.key().as_bytes(), &snap2.encode()).unwrap();

		let config = AggregatorConfig::default();
		let reclaimed = run_once(&store, &config).unwrap();
		assert_eq!(reclaimed, 2);

		let mut seen = Vec::new();
		store
			.raw_kv()
			.scan(b"metrics:hourly:", b"", |k, v| {
				seen.push((k.to_vec(), v.to_vec()));
				true
			})
			.unwrap();
		assert_eq!(seen.len(), 1);
		let agg: HourlyAggregate = serde_json::from_slice(&seen[0].1).unwrap();
		assert_eq!(agg.sample_count, 2);
		assert!((agg.average - 15.0).abs() < f64::EPSILON);

		let mut raw = Vec::new();
		store.raw_kv().scan(snapshot::snapshot_prefix().as_bytes(), b"", |k, v| {
			raw.push((k.to_vec(), v.to_vec()));
			true
		}).unwrap();
		assert!(raw.is_empty());
	}

	#[test]
	fn fresh_samples_are_left_alone() {
		let store = test_store();
		record(&store, "object_count", Some("b1"), 1.0).unwrap();
		let config = AggregatorConfig::default();
		let reclaimed = run_once(&store, &config).unwrap();
		assert_eq!(reclaimed, 0);
	}
}
