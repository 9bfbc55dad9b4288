//! Stand-alone CLI for running the Engine-A -> Engine-B migration
//! out-of-band, before starting the server, instead of relying on the
//! automatic migration-on-open that `metakv::Store::open` performs.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
	name = "metakv-convert",
	about = "Convert a metakv metadata directory from Engine-A to Engine-B in place"
)]
struct Opt {
	/// Parent directory containing `metadata/` (and, after a successful
	/// run, `metadata_badger_backup_<timestamp>/`).
	#[arg(long, env = "METAKV_DATA_DIR")]
	data_dir: PathBuf,

	/// Block cache size, in MiB, used while opening the target Engine-B
	/// database.
	#[arg(long, default_value_t = 256)]
	block_cache_mb: usize,
}

#[cfg(all(feature = "engine-a", feature = "engine-b"))]
fn main() {
	pretty_env_logger::init();
	let opt = Opt::parse();

	match metakv_db::migration::run_migration(&opt.data_dir, opt.block_cache_mb) {
		Ok(metakv_db::migration::MigrationOutcome::NoOp) => {
			println!("no Engine-A directory found at {}, nothing to do", opt.data_dir.display());
		}
		Ok(metakv_db::migration::MigrationOutcome::Migrated { keys_copied }) => {
			println!("migration complete: {} keys copied", keys_copied);
		}
		Err(e) => {
			eprintln!("migration failed: {}", e);
			std::process::exit(1);
		}
	}
}

#[cfg(not(all(feature = "engine-a", feature = "engine-b")))]
fn main() {
	eprintln!("metakv-convert needs both the engine-a and engine-b features enabled to migrate between them");
	std::process::exit(1);
}
