//! Shared data-model building blocks used by records in `metakv_store`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A field that the wire format allows to be either a single scalar or a
/// list of scalars (e.g. a policy statement's `action`, which AWS-compatible
/// clients may send as one string or as an array).
///
/// Decoding accepts both shapes; encoding always normalizes to the list
/// form, so once a value has passed through this store its shape is no
/// longer ambiguous for downstream readers.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
	One(T),
	Many(Vec<T>),
}

impl<T> OneOrMany<T> {
	pub fn into_vec(self) -> Vec<T> {
		match self {
			OneOrMany::One(v) => vec![v],
			OneOrMany::Many(v) => v,
		}
	}

	pub fn as_slice(&self) -> &[T] {
		match self {
			OneOrMany::One(_) => std::slice::from_ref(self.one_ref().unwrap()),
			OneOrMany::Many(v) => v,
		}
	}

	fn one_ref(&self) -> Option<&T> {
		match self {
			OneOrMany::One(v) => Some(v),
			OneOrMany::Many(_) => None,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			OneOrMany::One(_) => 1,
			OneOrMany::Many(v) => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T: Clone + Serialize> Serialize for OneOrMany<T> {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		match self {
			OneOrMany::One(v) => [v].serialize(serializer),
			OneOrMany::Many(v) => v.serialize(serializer),
		}
	}
}

impl<T> From<Vec<T>> for OneOrMany<T> {
	fn from(v: Vec<T>) -> Self {
		OneOrMany::Many(v)
	}
}

impl<T> Default for OneOrMany<T> {
	fn default() -> Self {
		OneOrMany::Many(Vec::new())
	}
}

/// Captures JSON fields unknown to this version of the record so that a
/// decode-then-encode round trip through this store never silently drops
/// information a newer or older binary wrote.
pub type ExtraFields = BTreeMap<String, serde_json::Value>;
