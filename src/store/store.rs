//! The `Store`: owns the engine handle for its entire process lifetime, the
//! concurrency primitives and the background workers it spawns alongside it.
//! Every entity operation (buckets.rs, objects.rs, versions.rs, multipart.rs,
//! tags.rs, search.rs) is an inherent method on this struct; together they
//! realize the metadata store contract. A separate trait duplicating these
//! signatures was considered and dropped (see DESIGN.md): the only
//! polymorphic seam in this crate is the engine itself, already abstracted
//! by `metakv_db::KvEngine`.

use std::sync::Arc;

use metakv_db::KvEngine;
use metakv_util::background::{shutdown_channel, CancellationToken, ShutdownHandle, ShutdownSignal};
use metakv_util::config::StoreConfig;
use metakv_util::Error;

use crate::concurrency::{BucketLocks, CreationLock};
use crate::rawkv::RawKv;
use crate::workers::WorkerHandles;

/// Process-scoped entity store. Constructed once at startup via
/// [`Store::open`] and closed once at shutdown via [`Store::close`];
/// `metakv_util::background` forbids more than one instance over the same
/// directory (enforced by the underlying engine's own file locking).
pub struct Store {
	pub(crate) engine: Arc<dyn KvEngine>,
	pub(crate) config: StoreConfig,
	pub(crate) creation_lock: CreationLock,
	pub(crate) bucket_locks: BucketLocks,
	shutdown_handle: ShutdownHandle,
	workers: std::sync::Mutex<Option<WorkerHandles>>,
}

impl Store {
	/// Opens (creating if absent) the engine directory named by
	/// `config.live_dir()`, choosing the binding named by `config.engine`.
	/// Does **not** run the Engine-A -> Engine-B migration itself: callers
	/// that want migrate-on-open should run `metakv_db::migration::run_migration`
	/// against `config.metadata_dir` first (this is what the `metakv` crate's
	/// top-level `open` does; see its doc comment).
	pub fn open(config: StoreConfig) -> Result<Arc<Store>, Error> {
		let engine = open_engine(&config)?;
		let (shutdown_handle, shutdown_signal) = shutdown_channel();

		let store = Arc::new(Store {
			engine,
			config,
			creation_lock: CreationLock::new(),
			bucket_locks: BucketLocks::new(),
			shutdown_handle,
			workers: std::sync::Mutex::new(None),
		});

		let workers = crate::workers::spawn(&store, shutdown_signal);
		*store.workers.lock().unwrap_or_else(|e| e.into_inner()) = Some(workers);

		Ok(store)
	}

	/// A reduced get/put/delete/batch/scan/gc view of the same engine handle,
	/// reserved to the `metrics:` key prefix.
	pub fn raw_kv(&self) -> RawKv<'_> {
		RawKv::new(&*self.engine)
	}

	/// Idempotent: fences every background worker via the shutdown signal,
	/// then flushes and releases the engine's file handles. Callers must not
	/// invoke any other method after this returns.
	pub fn close(&self) -> Result<(), Error> {
		self.shutdown_handle.fire();
		if let Some(workers) = self.workers.lock().unwrap_or_else(|e| e.into_inner()).take() {
			workers.abort();
		}
		self.engine.close().map_err(Error::from)
	}

	pub(crate) fn check_cancel(token: &CancellationToken) -> Result<(), Error> {
		token.check()
	}
}

fn open_engine(config: &StoreConfig) -> Result<Arc<dyn KvEngine>, Error> {
	let dir = config.live_dir();
	match config.engine.as_str() {
		#[cfg(feature = "engine-a")]
		"engine_a" => {
			let e = metakv_db::engine_a::EngineA::open(&dir, config.block_cache_mb)?;
			Ok(Arc::new(e))
		}
		#[cfg(feature = "engine-b")]
		"engine_b" => {
			let e = metakv_db::engine_b::EngineB::open(&dir, config.block_cache_mb)?;
			Ok(Arc::new(e))
		}
		other => Err(Error::Message(format!(
			"unknown or disabled engine {:?} (enable the matching crate feature)",
			other
		))),
	}
}
