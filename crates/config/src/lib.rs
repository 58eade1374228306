//! # Config — engine-wide tuning constants
//!
//! Compaction triggers and sampling periods shared by the write path, the
//! flush path, and the background compaction scheduler. They live in their
//! own crate so the leaf crates and the policy crates agree on one set of
//! numbers without depending on each other.

/// Number of levels in the LSM tree. Level 0 holds freshly flushed runs
/// (key ranges may overlap); deeper levels hold larger, older, compacted
/// runs with disjoint key ranges.
pub const NUM_LEVELS: usize = 7;

/// A level-0 compaction is scheduled once this many level-0 files exist.
pub const L0_COMPACTION_TRIGGER: usize = 4;

/// Soft limit on level-0 files. Writes are slowed down from this point so a
/// lagging compactor gets a chance to catch up before the hard stop.
pub const L0_SLOWDOWN_WRITES_TRIGGER: usize = 8;

/// Hard limit on level-0 files. Writes are stopped entirely at this point
/// until compaction drains level 0.
pub const L0_STOP_WRITES_TRIGGER: usize = 12;

/// Deepest level a freshly flushed run may be pushed to when it does not
/// overlap existing files. Pushing past level 0 avoids the relatively
/// expensive 0->1 compactions, but we never push all the way down: a key
/// range that is repeatedly overwritten would waste a lot of space in the
/// large levels.
pub const MAX_MEM_COMPACT_LEVEL: usize = 2;

/// Approximate gap in bytes between compaction-priority samples taken while
/// iterators scan data.
pub const READ_BYTES_PERIOD: u64 = 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_are_ordered() {
        assert!(L0_COMPACTION_TRIGGER < L0_SLOWDOWN_WRITES_TRIGGER);
        assert!(L0_SLOWDOWN_WRITES_TRIGGER < L0_STOP_WRITES_TRIGGER);
    }

    #[test]
    fn push_level_stays_inside_tree() {
        assert!(MAX_MEM_COMPACT_LEVEL < NUM_LEVELS);
    }
}
