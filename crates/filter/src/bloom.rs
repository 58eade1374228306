//! Bloom filter policy: the stock [`FilterPolicy`](crate::FilterPolicy)
//! implementation.

use crate::FilterPolicy;

/// A stateless bloom filter policy sized at a fixed number of bits per key.
///
/// `create_filter` emits a bit array followed by a trailing byte recording
/// the probe count, so the filter bytes are self-describing and
/// `key_may_match` needs no out-of-band state.
///
/// Uses double hashing: probe `i` lands at `h1 + i * h2` where `h1` and `h2`
/// are FNV-1a hashes with two different bases.
pub struct BloomFilterPolicy {
    bits_per_key: usize,
    num_probes: u32,
}

impl BloomFilterPolicy {
    /// Creates a policy allocating `bits_per_key` filter bits per key.
    /// 10 bits per key gives roughly a 1% false positive rate.
    pub fn new(bits_per_key: usize) -> Self {
        // Optimal probe count: k = bits_per_key * ln(2).
        let k = (bits_per_key as f64 * std::f64::consts::LN_2).round() as u32;
        Self {
            bits_per_key,
            num_probes: k.clamp(1, 30),
        }
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &str {
        "keelkv.BloomFilter"
    }

    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>) {
        // Floor on the array size: tiny key sets would otherwise produce a
        // filter too dense to be useful.
        let bits = (keys.len() * self.bits_per_key).max(64);
        let bytes = (bits + 7) / 8;
        let bits = (bytes * 8) as u64;

        let start = dst.len();
        dst.resize(start + bytes, 0);
        for key in keys {
            let (h1, h2) = hash_pair(key);
            for i in 0..self.num_probes {
                let bit = probe_index(h1, h2, i, bits);
                dst[start + (bit / 8) as usize] |= 1 << (bit % 8);
            }
        }
        dst.push(self.num_probes as u8);
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        if filter.len() < 2 {
            return false;
        }
        let bits = ((filter.len() - 1) * 8) as u64;
        let probes = u32::from(filter[filter.len() - 1]);
        if probes > 30 {
            // Reserved for future encodings: err on the side of matching.
            return true;
        }

        let (h1, h2) = hash_pair(key);
        for i in 0..probes {
            let bit = probe_index(h1, h2, i, bits);
            if (filter[(bit / 8) as usize] >> (bit % 8)) & 1 == 0 {
                return false;
            }
        }
        true
    }
}

/// Two independent 64-bit hashes from FNV-1a with different bases.
fn hash_pair(key: &[u8]) -> (u64, u64) {
    (
        fnv1a_64(key, 0xcbf29ce484222325),
        fnv1a_64(key, 0x517cc1b727220a95),
    )
}

/// Double hashing: probe i lands at (h1 + i * h2) mod bits.
fn probe_index(h1: u64, h2: u64, i: u32, bits: u64) -> u64 {
    h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % bits
}

/// FNV-1a 64-bit hash with a configurable starting basis.
fn fnv1a_64(data: &[u8], basis: u64) -> u64 {
    const FNV_PRIME: u64 = 0x00000100000001b3;
    let mut hash = basis;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
