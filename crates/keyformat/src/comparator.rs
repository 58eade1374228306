//! User-key and internal-key ordering.
//!
//! The engine never compares stored keys with anything but an injected
//! [`Comparator`]: the user-supplied order defines the key space, and the
//! [`InternalKeyComparator`] layers version ordering on top of it.

use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    extract_tag, extract_user_key, pack_tag, MAX_SEQUENCE_NUMBER, TAG_BYTES, VALUE_TYPE_FOR_SEEK,
};

/// Total order over user keys, injected at store construction.
///
/// Implementations must be pure and reentrant: `compare` defines the only
/// ordering the engine ever uses over the key space, and [`Comparator::name`]
/// identifies it in store metadata so a store refuses to open under a
/// different order.
pub trait Comparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Stable identifier persisted with store metadata at creation time.
    fn name(&self) -> &str;

    /// If possible, shortens `start` to a byte string that still compares
    /// `>= start` and `< limit`. May leave `start` unchanged. Block-index
    /// builders use this to keep index entries compact.
    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]);

    /// If possible, changes `key` to a shorter byte string that compares
    /// `>= key`. May leave `key` unchanged.
    fn find_short_successor(&self, key: &mut Vec<u8>);
}

/// Lexicographic byte-wise ordering; the stock user comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &str {
        "keelkv.BytewiseComparator"
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        // Find the first differing byte.
        let min_len = start.len().min(limit.len());
        let mut diff = 0;
        while diff < min_len && start[diff] == limit[diff] {
            diff += 1;
        }

        if diff >= min_len {
            // One string is a prefix of the other; no shortening possible.
            return;
        }

        let byte = start[diff];
        if byte < 0xff && byte + 1 < limit[diff] {
            start[diff] = byte + 1;
            start.truncate(diff + 1);
            debug_assert_eq!(self.compare(start, limit), Ordering::Less);
        }
    }

    fn find_short_successor(&self, key: &mut Vec<u8>) {
        // Bump the first byte that can be incremented and drop the rest.
        for i in 0..key.len() {
            if key[i] != 0xff {
                key[i] += 1;
                key.truncate(i + 1);
                return;
            }
        }
        // All 0xff: key is its own successor-prefix, leave unchanged.
    }
}

/// Order over encoded internal keys.
///
/// User-key portions are compared with the wrapped comparator; ties break on
/// the trailing tag compared *in reverse*, so higher sequences sort first
/// and, for equal sequences, `Value` sorts before `Deletion`.
#[derive(Debug, Clone)]
pub struct InternalKeyComparator<C> {
    user: C,
}

impl<C: Comparator> InternalKeyComparator<C> {
    pub fn new(user: C) -> Self {
        Self { user }
    }

    pub fn user_comparator(&self) -> &C {
        &self.user
    }
}

/// The maximal-sequence seek tag appended when a user-key projection is
/// shortened: it sorts earliest among entries with that user key, so the
/// shortened key still precedes every real record it separates from.
fn append_seek_tag(dst: &mut Vec<u8>) {
    let mut tag = [0u8; TAG_BYTES];
    LittleEndian::write_u64(&mut tag, pack_tag(MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK));
    dst.extend_from_slice(&tag);
}

impl<C: Comparator> Comparator for InternalKeyComparator<C> {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.user.compare(extract_user_key(a), extract_user_key(b)) {
            Ordering::Equal => extract_tag(b).cmp(&extract_tag(a)),
            ord => ord,
        }
    }

    fn name(&self) -> &str {
        "keelkv.InternalKeyComparator"
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        // Attempt to shorten the user-key portion only.
        let user_start = extract_user_key(start);
        let user_limit = extract_user_key(limit);
        let mut tmp = user_start.to_vec();
        self.user.find_shortest_separator(&mut tmp, user_limit);

        if tmp.len() < user_start.len() && self.user.compare(user_start, &tmp) == Ordering::Less {
            append_seek_tag(&mut tmp);
            debug_assert_eq!(self.compare(start, &tmp), Ordering::Less);
            debug_assert_eq!(self.compare(&tmp, limit), Ordering::Less);
            *start = tmp;
        }
    }

    fn find_short_successor(&self, key: &mut Vec<u8>) {
        let user_key = extract_user_key(key);
        let mut tmp = user_key.to_vec();
        self.user.find_short_successor(&mut tmp);

        if tmp.len() < user_key.len() && self.user.compare(user_key, &tmp) == Ordering::Less {
            append_seek_tag(&mut tmp);
            debug_assert_eq!(self.compare(key, &tmp), Ordering::Less);
            *key = tmp;
        }
    }
}
