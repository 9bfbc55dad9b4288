//! Error type local to the engine adapter layer.
//!
//! Kept separate from `metakv_util::Error` (which depends on this crate, not
//! the other way around) so the dependency graph stays acyclic, the same way
//! `garage_db::Error` is independent of `garage_util::Error`.

use err_derive::Error as DeriveError;

#[derive(Debug, DeriveError)]
pub enum Error {
	#[error(display = "I/O error: {}", _0)]
	Io(#[error(source)] std::io::Error),

	#[error(display = "{}", _0)]
	Message(String),

	#[cfg(feature = "engine-a")]
	#[error(display = "rocksdb error: {}", _0)]
	RocksDb(#[error(source)] rocksdb::Error),

	#[cfg(feature = "engine-b")]
	#[error(display = "fjall error: {}", _0)]
	Fjall(#[error(source)] fjall::Error),
}

impl Error {
	pub fn msg<S: Into<String>>(s: S) -> Self {
		Error::Message(s.into())
	}
}
