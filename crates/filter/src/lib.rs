//! # Filter — approximate-membership filters over user keys
//!
//! SSTables embed per-table filters so point lookups can skip tables that
//! definitely do not contain a key. Filters are defined over *user* keys by
//! an injected [`FilterPolicy`]; the tables themselves store encoded internal
//! keys, so [`InternalFilterPolicy`] sits between the two, stripping the
//! 8-byte tag before delegating.
//!
//! A filter may return false positives but never false negatives beyond what
//! the wrapped policy itself permits.

use keyformat::extract_user_key;

mod bloom;
pub use bloom::BloomFilterPolicy;

/// Approximate-membership filter builder and tester, injected at store
/// construction. Implementations must be pure and reentrant.
pub trait FilterPolicy: Send + Sync {
    /// Stable identifier; persisted alongside filter blocks so a reader can
    /// tell which policy built them.
    fn name(&self) -> &str;

    /// Appends a filter summarizing `keys` to `dst`.
    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>);

    /// Must return `true` if `key` was in the set the filter was built from;
    /// may return `true` for keys that were not.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

/// Projects a user-key filter policy onto encoded internal keys.
///
/// The emitted filter bytes are identical to building the wrapped policy's
/// filter directly from the user keys: all versions of a user key map to the
/// same filter entry, which is exactly what point lookups need.
pub struct InternalFilterPolicy<P> {
    user: P,
}

impl<P: FilterPolicy> InternalFilterPolicy<P> {
    pub fn new(user: P) -> Self {
        Self { user }
    }

    pub fn user_policy(&self) -> &P {
        &self.user
    }
}

impl<P: FilterPolicy> FilterPolicy for InternalFilterPolicy<P> {
    fn name(&self) -> &str {
        // Filter blocks stay readable under the user policy's name.
        self.user.name()
    }

    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>) {
        let user_keys: Vec<&[u8]> = keys.iter().map(|k| extract_user_key(k)).collect();
        self.user.create_filter(&user_keys, dst);
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        self.user.key_may_match(extract_user_key(key), filter)
    }
}

#[cfg(test)]
mod tests;
