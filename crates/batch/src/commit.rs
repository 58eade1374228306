//! Commit pipeline: sequence reservation and atomic batch apply.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use keyformat::{append_internal_key, SequenceNumber, ValueType, MAX_SEQUENCE_NUMBER};

use crate::{BatchError, BatchHandler, WriteBatch};

/// The backing sorted structure a committed batch is applied to.
///
/// `insert` receives the fully encoded internal key and the value (empty for
/// deletions). Inserting into the in-memory structure is infallible at this
/// layer; corruption is ruled out before the first call by batch validation.
pub trait BatchTarget {
    fn insert(&self, internal_key: &[u8], value: &[u8]);
}

/// Serialization point for all commits against one store instance.
///
/// Batches may be prepared concurrently, but only one at a time holds the
/// reservation+apply critical section. Each committing batch is granted a
/// unique, gap-free, monotonically increasing sequence range; the
/// serialization order of concurrent commits is exactly the order the
/// ranges were granted in.
///
/// Readers never take the commit lock: they load [`visible_sequence`] with
/// acquire ordering and proceed lock-free from there.
///
/// [`visible_sequence`]: CommitPipeline::visible_sequence
pub struct CommitPipeline {
    /// Held for the whole reservation+apply critical section.
    commit_lock: Mutex<()>,
    /// Highest sequence number ever reserved.
    last_sequence: AtomicU64,
    /// Highest sequence number readers may observe. Trails `last_sequence`
    /// while a batch is mid-apply.
    visible_sequence: AtomicU64,
}

impl CommitPipeline {
    /// Starts the pipeline with `last_sequence` already consumed (zero for a
    /// fresh store, the recovered maximum after restart).
    pub fn new(last_sequence: SequenceNumber) -> Self {
        Self {
            commit_lock: Mutex::new(()),
            last_sequence: AtomicU64::new(last_sequence),
            visible_sequence: AtomicU64::new(last_sequence),
        }
    }

    /// Snapshot sequence for readers: every batch at or below this value has
    /// fully applied.
    pub fn visible_sequence(&self) -> SequenceNumber {
        self.visible_sequence.load(Ordering::Acquire)
    }

    /// Highest reserved sequence, including batches still applying.
    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Commits `batch` against `target`, returning the batch's base
    /// sequence.
    ///
    /// Record `N` (in append order) is applied under `base + N` as an
    /// encoded internal key. The externally visible sequence advances to
    /// `base + count - 1` only after the last record is in, so no reader
    /// ever observes a sequence inside a half-applied batch.
    pub fn commit<T: BatchTarget>(
        &self,
        batch: &mut WriteBatch,
        target: &T,
    ) -> Result<SequenceNumber, BatchError> {
        let guard = match self.commit_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Reject corruption before reserving anything: a failed batch must
        // not burn sequence numbers or leave a gap in visible history.
        batch.validate()?;

        let count = u64::from(batch.count());
        let last = self.last_sequence.load(Ordering::Relaxed);
        if MAX_SEQUENCE_NUMBER - last < count {
            return Err(BatchError::SequenceExhausted);
        }

        let base = last + 1;
        batch.set_sequence(base);
        if count == 0 {
            // Nothing to reserve or apply; visible history is unchanged.
            return Ok(base);
        }
        self.last_sequence.fetch_add(count, Ordering::SeqCst);

        let mut inserter = Inserter {
            sequence: base,
            target,
            key_buf: Vec::new(),
        };
        // Validation already passed; apply cannot fail from here on.
        batch.iterate(&mut inserter)?;

        self.visible_sequence
            .store(base + count - 1, Ordering::Release);
        drop(guard);
        Ok(base)
    }
}

/// Applies batch records to the target with consecutive sequence numbers,
/// encoding each internal key into a reusable scratch buffer.
struct Inserter<'a, T: BatchTarget> {
    sequence: SequenceNumber,
    target: &'a T,
    key_buf: Vec<u8>,
}

impl<T: BatchTarget> BatchHandler for Inserter<'_, T> {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.key_buf.clear();
        append_internal_key(&mut self.key_buf, key, self.sequence, ValueType::Value);
        self.target.insert(&self.key_buf, value);
        self.sequence += 1;
    }

    fn delete(&mut self, key: &[u8]) {
        self.key_buf.clear();
        append_internal_key(&mut self.key_buf, key, self.sequence, ValueType::Deletion);
        self.target.insert(&self.key_buf, b"");
        self.sequence += 1;
    }
}
