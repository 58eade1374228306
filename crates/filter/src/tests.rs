use super::*;
use keyformat::{append_internal_key, ValueType};

fn internal(user_key: &[u8], seq: u64, t: ValueType) -> Vec<u8> {
    let mut k = Vec::new();
    append_internal_key(&mut k, user_key, seq, t);
    k
}

// -------------------- Bloom policy --------------------

#[test]
fn bloom_no_false_negatives() {
    let policy = BloomFilterPolicy::new(10);
    let keys: Vec<Vec<u8>> = (0..1000).map(|i| format!("key{}", i).into_bytes()).collect();
    let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();

    let mut filter = Vec::new();
    policy.create_filter(&refs, &mut filter);

    for key in &keys {
        assert!(policy.key_may_match(key, &filter), "lost key {:?}", key);
    }
}

#[test]
fn bloom_filters_out_most_absent_keys() {
    let policy = BloomFilterPolicy::new(10);
    let keys: Vec<Vec<u8>> = (0..1000).map(|i| format!("key{}", i).into_bytes()).collect();
    let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();

    let mut filter = Vec::new();
    policy.create_filter(&refs, &mut filter);

    let false_positives = (0..1000)
        .filter(|i| policy.key_may_match(format!("absent{}", i).as_bytes(), &filter))
        .count();
    // 10 bits/key targets ~1%; leave generous slack for hash variance.
    assert!(
        false_positives < 100,
        "false positive count too high: {}",
        false_positives
    );
}

#[test]
fn bloom_empty_key_set_matches_nothing_it_lost() {
    let policy = BloomFilterPolicy::new(10);
    let mut filter = Vec::new();
    policy.create_filter(&[], &mut filter);
    // An empty filter is still well-formed; membership answers are allowed
    // either way, but the call must not panic.
    let _ = policy.key_may_match(b"anything", &filter);
}

#[test]
fn bloom_rejects_degenerate_filter_bytes() {
    let policy = BloomFilterPolicy::new(10);
    assert!(!policy.key_may_match(b"k", b""));
    assert!(!policy.key_may_match(b"k", b"\x01"));
}

#[test]
fn bloom_reserved_probe_count_matches_everything() {
    let policy = BloomFilterPolicy::new(10);
    // Trailing byte 31 is outside the supported probe range.
    let filter = vec![0u8, 0, 0, 0, 31];
    assert!(policy.key_may_match(b"whatever", &filter));
}

// -------------------- Internal-key adapter --------------------

#[test]
fn adapter_output_identical_to_user_key_filter() {
    let user_policy = BloomFilterPolicy::new(10);
    let internal_policy = InternalFilterPolicy::new(BloomFilterPolicy::new(10));

    let k1 = internal(b"alpha", 100, ValueType::Value);
    let k2 = internal(b"beta", 7, ValueType::Deletion);
    let k3 = internal(b"gamma", 0, ValueType::Value);

    let mut from_internal = Vec::new();
    internal_policy.create_filter(&[&k1, &k2, &k3], &mut from_internal);

    let mut from_user = Vec::new();
    user_policy.create_filter(&[b"alpha", b"beta", b"gamma"], &mut from_user);

    assert_eq!(from_internal, from_user);
}

#[test]
fn adapter_matches_any_version_of_a_user_key() {
    let internal_policy = InternalFilterPolicy::new(BloomFilterPolicy::new(10));

    let stored = internal(b"k", 5, ValueType::Value);
    let mut filter = Vec::new();
    internal_policy.create_filter(&[&stored], &mut filter);

    // Probing with a different sequence/type still hits: the filter is over
    // user keys only.
    let probe = internal(b"k", 99, ValueType::Deletion);
    assert!(internal_policy.key_may_match(&probe, &filter));
}

#[test]
fn adapter_reports_wrapped_policy_name() {
    let internal_policy = InternalFilterPolicy::new(BloomFilterPolicy::new(10));
    assert_eq!(internal_policy.name(), "keelkv.BloomFilter");
    assert_eq!(internal_policy.user_policy().name(), "keelkv.BloomFilter");
}
