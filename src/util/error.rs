//! Closed error taxonomy for the metadata store.
//!
//! Every public `MetadataStore` operation returns `Result<_, Error>`. No
//! engine-specific error type (`metakv_db::Error`, `rocksdb::Error`,
//! `fjall::Error`, ...) is ever allowed to leak through this boundary: it is
//! always wrapped into `Error::Db` or folded into a more specific precondition
//! variant first.

use err_derive::Error as DeriveError;

/// The fixed error taxonomy of the metadata store.
///
/// Precondition variants (`BucketNotFound`, `BucketAlreadyExists`, ...) carry
/// no durable effect and are safe to retry once the caller fixes its input.
/// `Db` and `Message` wrap transient or fatal engine/IO failures with a
/// descriptive prefix.
#[derive(Debug, DeriveError)]
pub enum Error {
	#[error(display = "Bucket not found: {}", _0)]
	BucketNotFound(String),

	#[error(display = "Bucket already exists: {}", _0)]
	BucketAlreadyExists(String),

	#[error(display = "Object not found: {}", _0)]
	ObjectNotFound(String),

	#[error(display = "Invalid key: {}", _0)]
	InvalidKey(String),

	#[error(display = "Invalid bucket name: {}", _0)]
	InvalidBucketName(String),

	#[error(display = "Multipart upload not found: {}", _0)]
	UploadNotFound(String),

	#[error(display = "Part not found: {}", _0)]
	PartNotFound(String),

	#[error(display = "Object version not found: {}", _0)]
	VersionNotFound(String),

	/// Generic not-found, used by the raw-KV facade which has no entity
	/// vocabulary of its own.
	#[error(display = "Not found: {}", _0)]
	NotFound(String),

	/// The calling operation's cancellation token was observed cancelled
	/// before any durable mutation was issued.
	#[error(display = "Operation cancelled")]
	Cancelled,

	/// A wrapped storage-engine error, already stripped of any
	/// engine-specific type information.
	#[error(display = "Storage engine error: {}", _0)]
	Db(#[error(source)] metakv_db::Error),

	/// Catch-all for everything else (I/O, (de)serialization, config
	/// parsing, internal invariants). The string should always explain
	/// *which* operation failed and why, e.g. via `ResultExt::ok_or_message`.
	#[error(display = "{}", _0)]
	Message(String),
}

impl Error {
	/// `true` for errors that carry no durable effect and are safe for the
	/// caller to retry immediately after fixing their input.
	pub fn is_precondition(&self) -> bool {
		matches!(
			self,
			Error::BucketNotFound(_)
				| Error::BucketAlreadyExists(_)
				| Error::ObjectNotFound(_)
				| Error::InvalidKey(_)
				| Error::InvalidBucketName(_)
				| Error::UploadNotFound(_)
				| Error::PartNotFound(_)
				| Error::VersionNotFound(_)
				| Error::NotFound(_)
		)
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Error {
		Error::Message(format!("(de)serialization error: {}", e))
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Error {
		Error::Message(format!("I/O error: {}", e))
	}
}

/// Extension trait that turns an `Option` or a foreign `Result` into our
/// closed `Error` type, attaching a human-readable message.
///
/// Mirrors `garage_util::error::ResultExt` / `OkOrMessage`: this is the
/// idiom used throughout the store instead of `.unwrap()` or `.expect()`.
pub trait ResultExt<T> {
	fn ok_or_message<S: Into<String>>(self, msg: S) -> Result<T, Error>;
}

impl<T> ResultExt<T> for Option<T> {
	fn ok_or_message<S: Into<String>>(self, msg: S) -> Result<T, Error> {
		self.ok_or_else(|| Error::Message(msg.into()))
	}
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
	fn ok_or_message<S: Into<String>>(self, msg: S) -> Result<T, Error> {
		self.map_err(|e| Error::Message(format!("{}: {}", msg.into(), e)))
	}
}
