//! # Admission — write backpressure and compaction signals
//!
//! Level 0 fills up with freshly flushed runs faster than compaction can
//! drain it under sustained ingestion, so the write path is gated on the
//! level-0 file count with a three-stage response:
//!
//! 1. at [`config::L0_COMPACTION_TRIGGER`] files, schedule a background
//!    compaction (non-blocking);
//! 2. at [`config::L0_SLOWDOWN_WRITES_TRIGGER`], additionally delay each
//!    write, harder the further compaction lags;
//! 3. at [`config::L0_STOP_WRITES_TRIGGER`], block writes until the level
//!    drains — interruptible by shutdown and bounded by a host-configured
//!    wait, never an unbounded hang.
//!
//! The [`AdmissionController`] only records signals and gates writers; which
//! level actually gets compacted next is the external scheduler's decision,
//! informed by the read-sampling counters collected here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

use config::{
    L0_COMPACTION_TRIGGER, L0_SLOWDOWN_WRITES_TRIGGER, L0_STOP_WRITES_TRIGGER,
    MAX_MEM_COMPACT_LEVEL, NUM_LEVELS, READ_BYTES_PERIOD,
};

/// Base unit of the slowdown delay; the total delay grows by one unit for
/// every level-0 file past the slowdown trigger.
const SLOWDOWN_DELAY_UNIT: Duration = Duration::from_millis(1);

/// Errors surfaced by the gated write path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// The stop-trigger stall outlived the configured bound with no
    /// compaction progress: resource exhaustion, reported instead of
    /// hanging.
    #[error("write stalled at level-0 stop trigger for {waited:?}")]
    Stalled { waited: Duration },

    /// The store is shutting down; the write was not admitted.
    #[error("store is shutting down")]
    ShutDown,
}

/// What the write path must do before admitting the next write, given the
/// current level-0 file count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAdmission {
    /// Below every trigger: write immediately.
    Proceed,
    /// Schedule a background level-0 compaction, then write.
    Compact,
    /// Schedule compaction and delay the write by the given backpressure.
    Delay(Duration),
    /// Level 0 is full: block until compaction drains it.
    Stop,
}

/// Classifies a level-0 file count against the compaction triggers.
pub fn classify(l0_files: usize) -> WriteAdmission {
    if l0_files >= L0_STOP_WRITES_TRIGGER {
        WriteAdmission::Stop
    } else if l0_files >= L0_SLOWDOWN_WRITES_TRIGGER {
        WriteAdmission::Delay(slowdown_delay(l0_files))
    } else if l0_files >= L0_COMPACTION_TRIGGER {
        WriteAdmission::Compact
    } else {
        WriteAdmission::Proceed
    }
}

/// Backpressure grows with every file past the slowdown trigger, so a
/// writer racing a lagging compactor is slowed harder the further behind
/// compaction gets.
fn slowdown_delay(l0_files: usize) -> Duration {
    let over = (l0_files - L0_SLOWDOWN_WRITES_TRIGGER) as u32 + 1;
    SLOWDOWN_DELAY_UNIT * over
}

/// Chooses the level a freshly flushed sorted run should land in.
///
/// `overlaps(level)` answers whether the run's key range overlaps any file
/// resident in that level. Pushing past level 0 skips the relatively
/// expensive 0->1 compactions, but never deeper than
/// [`config::MAX_MEM_COMPACT_LEVEL`]: a repeatedly overwritten key range
/// would bloat the large levels.
pub fn pick_push_level<F: Fn(usize) -> bool>(overlaps: F) -> usize {
    let mut level = 0;
    if !overlaps(0) {
        while level < MAX_MEM_COMPACT_LEVEL && !overlaps(level + 1) {
            level += 1;
        }
    }
    level
}

struct LevelState {
    files: [usize; NUM_LEVELS],
    shutting_down: bool,
}

/// Gate between the foreground write path and the background compaction
/// executor.
///
/// The flush path and the compaction executor report per-level file counts;
/// writers call [`admit_write`] before every write. Readers and the pure
/// format code never touch this; the only blocking point in the engine core
/// is the stop-trigger stall here.
///
/// [`admit_write`]: AdmissionController::admit_write
pub struct AdmissionController {
    state: Mutex<LevelState>,
    drained: Condvar,
    /// Upper bound on a single stop-trigger stall.
    stop_wait_bound: Duration,
    /// Cumulative bytes scanned by iterators, for read sampling.
    read_bytes: AtomicU64,
    /// Compaction-priority samples per level, drained by the scheduler.
    samples: Mutex<[u64; NUM_LEVELS]>,
}

impl AdmissionController {
    pub fn new(stop_wait_bound: Duration) -> Self {
        Self {
            state: Mutex::new(LevelState {
                files: [0; NUM_LEVELS],
                shutting_down: false,
            }),
            drained: Condvar::new(),
            stop_wait_bound,
            read_bytes: AtomicU64::new(0),
            samples: Mutex::new([0; NUM_LEVELS]),
        }
    }

    /// Reports the current number of sorted runs resident in `level`.
    ///
    /// Called by the flush path and the compaction executor only. Wakes any
    /// writer stalled at the stop trigger.
    pub fn update_level_files(&self, level: usize, files: usize) {
        debug_assert!(level < NUM_LEVELS);
        let mut state = lock(&self.state);
        state.files[level] = files;
        self.drained.notify_all();
    }

    pub fn level_files(&self, level: usize) -> usize {
        debug_assert!(level < NUM_LEVELS);
        lock(&self.state).files[level]
    }

    /// Cancels every stalled writer; each returns
    /// [`AdmissionError::ShutDown`]. Further writes are refused.
    pub fn shutdown(&self) {
        let mut state = lock(&self.state);
        state.shutting_down = true;
        self.drained.notify_all();
    }

    /// Gates one write against the level-0 triggers.
    ///
    /// Returns `Ok(true)` when a background level-0 compaction should be
    /// scheduled, `Ok(false)` when nothing is needed. Sleeps the slowdown
    /// delay in the `Delay` band (without holding the lock) and blocks in
    /// the `Stop` band until level 0 drains, the wait bound expires, or
    /// shutdown is signaled.
    pub fn admit_write(&self) -> Result<bool, AdmissionError> {
        let decision = {
            let state = lock(&self.state);
            if state.shutting_down {
                return Err(AdmissionError::ShutDown);
            }
            classify(state.files[0])
        };

        match decision {
            WriteAdmission::Proceed => Ok(false),
            WriteAdmission::Compact => Ok(true),
            WriteAdmission::Delay(delay) => {
                std::thread::sleep(delay);
                Ok(true)
            }
            WriteAdmission::Stop => self.wait_for_drain(),
        }
    }

    fn wait_for_drain(&self) -> Result<bool, AdmissionError> {
        let start = Instant::now();
        let mut state = lock(&self.state);
        loop {
            if state.shutting_down {
                return Err(AdmissionError::ShutDown);
            }
            if state.files[0] < L0_STOP_WRITES_TRIGGER {
                // Drained below the stop trigger; compaction is still
                // wanted, so the caller should keep it scheduled.
                return Ok(true);
            }
            let waited = start.elapsed();
            if waited >= self.stop_wait_bound {
                return Err(AdmissionError::Stalled { waited });
            }
            state = match self.drained.wait_timeout(state, self.stop_wait_bound - waited) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Accounts `bytes` scanned by an iterator against `level`.
    ///
    /// Each time the cumulative total crosses a
    /// [`config::READ_BYTES_PERIOD`] boundary, one compaction-priority
    /// sample is recorded for the level. Returns `true` when a sample was
    /// recorded.
    pub fn record_read_bytes(&self, level: usize, bytes: u64) -> bool {
        debug_assert!(level < NUM_LEVELS);
        let prev = self.read_bytes.fetch_add(bytes, Ordering::Relaxed);
        let crossed = (prev + bytes) / READ_BYTES_PERIOD - prev / READ_BYTES_PERIOD;
        if crossed == 0 {
            return false;
        }
        lock(&self.samples)[level] += crossed;
        true
    }

    /// Drains the accumulated per-level samples for the compaction
    /// scheduler.
    pub fn take_read_samples(&self) -> [u64; NUM_LEVELS] {
        std::mem::replace(&mut *lock(&self.samples), [0; NUM_LEVELS])
    }
}

/// A poisoned lock here only means another writer panicked mid-update; the
/// state itself is a plain counter array and stays usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests;
