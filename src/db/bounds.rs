//! Lexicographic prefix-bound arithmetic internal to the engine adapters.
//!
//! Deliberately duplicated from (not re-exported from) `metakv_util::key_schema`:
//! this crate must not depend on `metakv_util`, since `metakv_util::Error`
//! wraps `metakv_db::Error` the other way around.

pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
	let mut upper = prefix.to_vec();
	while let Some(&last) = upper.last() {
		if last == 0xff {
			upper.pop();
		} else {
			*upper.last_mut().unwrap() += 1;
			return Some(upper);
		}
	}
	None
}
