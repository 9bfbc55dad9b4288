//! Background workers: the multipart TTL reaper and the value-log GC ticker.
//! Both are purely cooperative `tokio` tasks that hold
//! no locks across sleeps, observe a single shared shutdown signal via
//! `tokio::select!` instead of a bare `sleep`, and absorb missed ticks
//! rather than bursting to catch up. Neither ever surfaces an error to a
//! caller: failures are logged and the loop continues at the next tick.

use std::sync::Arc;
use std::time::Duration;

use metakv_util::background::ShutdownSignal;
use metakv_util::time;

use crate::store::Store;

pub struct WorkerHandles {
	handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerHandles {
	pub fn abort(self) {
		for h in self.handles {
			h.abort();
		}
	}
}

/// Spawns whichever workers the active engine actually needs. Called once
/// from `Store::open`.
pub fn spawn(store: &Arc<Store>, shutdown: ShutdownSignal) -> WorkerHandles {
	let mut handles = Vec::new();

	if !store.engine.supports_ttl() {
		info!("Engine has no native per-key TTL: starting multipart upload reaper");
		handles.push(spawn_ttl_reaper(store.clone(), shutdown.clone()));
	}

	if store.engine.needs_value_log_gc() {
		info!("Engine benefits from periodic value-log GC: starting GC ticker");
		handles.push(spawn_value_log_gc(store.clone(), shutdown));
	}

	WorkerHandles { handles }
}

fn spawn_ttl_reaper(store: Arc<Store>, mut shutdown: ShutdownSignal) -> tokio::task::JoinHandle<()> {
	let interval_secs = store.config.ttl_reaper_interval_secs;
	let ttl_days = store.config.multipart_ttl_days;
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		loop {
			tokio::select! {
				_ = ticker.tick() => {}
				_ = shutdown.wait() => {
					info!("Multipart TTL reaper shutting down");
					return;
				}
			}
			if let Err(e) = reap_expired_uploads(&store, ttl_days) {
				error!("Multipart TTL reaper tick failed, will retry next interval: {}", e);
			}
		}
	})
}

fn reap_expired_uploads(store: &Store, ttl_days: i64) -> Result<(), metakv_util::Error> {
	let cutoff = time::now() - chrono::Duration::days(ttl_days);
	let uploads = store.list_all_upload_ids_for_reaper()?;
	let mut reaped = 0usize;
	for upload_id in uploads {
		match store.get_multipart_upload(&upload_id) {
			Ok(u) if u.initiated < cutoff => {
				if let Err(e) = store.abort_multipart_upload(&upload_id) {
					warn!("Failed to reap expired multipart upload {}: {}", upload_id, e);
				} else {
					reaped += 1;
				}
			}
			Ok(_) => {}
			Err(e) if e.is_precondition() => {
				// Already gone (raced with a client abort/complete); fine.
			}
			Err(e) => warn!("Failed to inspect multipart upload {} during TTL sweep: {}", upload_id, e),
		}
	}
	if reaped > 0 {
		info!("Multipart TTL reaper removed {} expired upload(s)", reaped);
	}
	Ok(())
}

#[cfg(all(test, feature = "engine-b"))]
mod test {
	use super::*;
	use crate::records::MultipartUploadMetadata;
	use crate::test_support::test_store;
	use metakv_util::background::CancellationToken;

	#[test]
	fn reap_removes_uploads_older_than_the_ttl_but_spares_fresh_ones() {
		let store = test_store();
		let tok = CancellationToken::never();

		let mut stale = MultipartUploadMetadata::new("old", "b1", "big");
		stale.initiated = time::now() - chrono::Duration::days(30);
		store.create_multipart_upload(stale, &tok).unwrap();

		store
			.create_multipart_upload(MultipartUploadMetadata::new("fresh", "b1", "small"), &tok)
			.unwrap();

		reap_expired_uploads(&store, store.config.multipart_ttl_days).unwrap();

		assert!(matches!(
			store.get_multipart_upload("old").unwrap_err(),
			metakv_util::Error::UploadNotFound(_)
		));
		assert!(store.get_multipart_upload("fresh").is_ok());
	}
}

fn spawn_value_log_gc(store: Arc<Store>, mut shutdown: ShutdownSignal) -> tokio::task::JoinHandle<()> {
	let interval_secs = store.config.value_log_gc_interval_secs;
	let discard_ratio = store.config.value_log_gc_discard_ratio;
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		loop {
			tokio::select! {
				_ = ticker.tick() => {}
				_ = shutdown.wait() => {
					info!("Value-log GC ticker shutting down");
					return;
				}
			}
			match store.engine.gc_value_log(discard_ratio) {
				Ok(true) => info!("Value-log GC reclaimed space"),
				Ok(false) => {}
				Err(e) => error!("Value-log GC tick failed, will retry next interval: {}", e),
			}
		}
	})
}
