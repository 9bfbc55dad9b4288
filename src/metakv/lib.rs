//! Metadata storage core for an S3-compatible object store.
//!
//! This crate is the thin assembly point over the four lower crates
//! (`metakv_util`, `metakv_db`, `metakv_store`, `metakv_metrics`), the way
//! the `garage` crate assembles `garage_util`/`garage_model`/`garage_rpc`/etc
//! into a single running instance. [`open`] is the one entry point most
//! callers need: it runs the Engine-A -> Engine-B migration if one is
//! pending, opens the entity store, and starts the metrics aggregator.

#[macro_use]
extern crate tracing;

pub use metakv_metrics::{record as record_metric, AggregatorConfig, HourlyAggregate, MetricSnapshot};
pub use metakv_store::{
	BucketMetadata, ListObjectsResult, MultipartUploadMetadata, ObjectLockConfig, ObjectMetadata, ObjectVersion, PartMetadata,
	RawKv, SearchFilter, SearchResult, Store, VersioningConfig,
};
pub use metakv_util::background::CancellationToken;
pub use metakv_util::config::StoreConfig;
pub use metakv_util::Error;

/// An opened metadata store together with the background handle for the
/// metrics aggregator this crate layers on top of it (the entity store's own
/// workers are started inside `Store::open` and need no separate handle).
pub struct Metakv {
	pub store: std::sync::Arc<Store>,
	aggregator: tokio::task::JoinHandle<()>,
	aggregator_shutdown: metakv_util::background::ShutdownHandle,
}

impl Metakv {
	/// Fences the aggregator via its shutdown signal, then closes the store
	/// the same way `Store::close` fences and joins its own workers.
	pub fn close(&self) -> Result<(), Error> {
		self.aggregator_shutdown.fire();
		self.aggregator.abort();
		self.store.close()
	}
}

/// Opens a metadata store at `config.metadata_dir`, migrating it from
/// Engine-A to Engine-B first if a previous run left an Engine-A directory
/// in place. This is the sequencing every caller should use instead of
/// calling `Store::open` directly: `Store::open` itself never migrates (see
/// its doc comment), so a binary that skips this function and opens
/// Engine-B directly against an Engine-A directory will simply fail to find
/// its data.
pub fn open(config: StoreConfig) -> Result<Metakv, Error> {
	open_with_aggregator(config, AggregatorConfig::default())
}

/// Like [`open`], but lets the caller tune the metrics aggregator's tick
/// interval and retention window instead of taking the default hourly,
/// 7-day policy.
pub fn open_with_aggregator(config: StoreConfig, aggregator_config: AggregatorConfig) -> Result<Metakv, Error> {
	run_migration_if_needed(&config)?;

	let store = Store::open(config)?;

	let (aggregator_shutdown, signal) = metakv_util::background::shutdown_channel();
	let aggregator = metakv_metrics::spawn_aggregator(store.clone(), signal, aggregator_config);

	Ok(Metakv { store, aggregator, aggregator_shutdown })
}

#[cfg(all(feature = "engine-a", feature = "engine-b"))]
fn run_migration_if_needed(config: &StoreConfig) -> Result<(), Error> {
	use metakv_db::migration::MigrationOutcome;

	match metakv_db::migration::run_migration(&config.metadata_dir, config.block_cache_mb)? {
		MigrationOutcome::NoOp => {}
		MigrationOutcome::Migrated { keys_copied } => {
			info!("Migrated metadata directory at {} to Engine-B ({} keys copied)", config.metadata_dir.display(), keys_copied);
		}
	}
	Ok(())
}

/// With only one engine binding compiled in there is nothing to migrate
/// from or to: `run_migration` itself only exists when both bindings are
/// available (it has to open both to copy between them).
#[cfg(not(all(feature = "engine-a", feature = "engine-b")))]
fn run_migration_if_needed(_config: &StoreConfig) -> Result<(), Error> {
	Ok(())
}
