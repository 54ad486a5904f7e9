//! Map helpers. Maps are `hashbrown`'s, keyed with `std`'s randomized `SipHasher` so
//! peer-controlled keys (channel ids) cannot be used to degrade lookups.

extern crate hashbrown;

pub use std::collections::hash_map::RandomState;

/// The HashMap type used throughout the crate.
pub type HashMap<K, V> = hashbrown::HashMap<K, V, RandomState>;

/// Builds a new [`HashMap`].
pub fn new_hash_map<K, V>() -> HashMap<K, V> {
	HashMap::with_hasher(RandomState::new())
}
