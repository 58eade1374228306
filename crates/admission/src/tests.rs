use super::*;
use std::sync::Arc;
use std::thread;

// -------------------- Classification --------------------

#[test]
fn classification_bands() {
    assert_eq!(classify(0), WriteAdmission::Proceed);
    assert_eq!(classify(3), WriteAdmission::Proceed);
    assert_eq!(classify(4), WriteAdmission::Compact);
    assert_eq!(classify(7), WriteAdmission::Compact);
    assert!(matches!(classify(8), WriteAdmission::Delay(_)));
    assert!(matches!(classify(11), WriteAdmission::Delay(_)));
    assert_eq!(classify(12), WriteAdmission::Stop);
    assert_eq!(classify(100), WriteAdmission::Stop);
}

#[test]
fn slowdown_delay_is_positive_and_strictly_increasing() {
    let mut previous = Duration::ZERO;
    for n in L0_SLOWDOWN_WRITES_TRIGGER..L0_STOP_WRITES_TRIGGER {
        match classify(n) {
            WriteAdmission::Delay(d) => {
                assert!(d > previous, "delay not increasing at n={}", n);
                previous = d;
            }
            other => panic!("expected Delay at n={}, got {:?}", n, other),
        }
    }
}

// -------------------- Push-level selection --------------------

#[test]
fn push_level_stays_at_zero_when_l0_overlaps() {
    assert_eq!(pick_push_level(|level| level == 0), 0);
}

#[test]
fn push_level_descends_to_first_overlap() {
    // Overlap only at level 2: the run can land in level 1.
    assert_eq!(pick_push_level(|level| level == 2), 1);
}

#[test]
fn push_level_caps_at_max_mem_compact_level() {
    // No overlap anywhere: still never deeper than the cap.
    assert_eq!(pick_push_level(|_| false), MAX_MEM_COMPACT_LEVEL);
}

// -------------------- Write gating --------------------

#[test]
fn admit_below_trigger_is_a_no_op() {
    let ctl = AdmissionController::new(Duration::from_secs(5));
    ctl.update_level_files(0, 3);
    assert_eq!(ctl.admit_write(), Ok(false));
}

#[test]
fn admit_at_trigger_requests_compaction() {
    let ctl = AdmissionController::new(Duration::from_secs(5));
    ctl.update_level_files(0, L0_COMPACTION_TRIGGER);
    assert_eq!(ctl.admit_write(), Ok(true));
}

#[test]
fn admit_in_slowdown_band_delays_then_proceeds() {
    let ctl = AdmissionController::new(Duration::from_secs(5));
    ctl.update_level_files(0, L0_SLOWDOWN_WRITES_TRIGGER);
    let start = Instant::now();
    assert_eq!(ctl.admit_write(), Ok(true));
    assert!(start.elapsed() >= Duration::from_millis(1));
}

#[test]
fn stop_band_blocks_until_level_drains() {
    let ctl = Arc::new(AdmissionController::new(Duration::from_secs(30)));
    ctl.update_level_files(0, L0_STOP_WRITES_TRIGGER);

    let writer = {
        let ctl = Arc::clone(&ctl);
        thread::spawn(move || ctl.admit_write())
    };

    // Give the writer time to park, then drain level 0.
    thread::sleep(Duration::from_millis(50));
    ctl.update_level_files(0, 2);

    assert_eq!(writer.join().unwrap(), Ok(true));
}

#[test]
fn stop_band_stall_is_bounded() {
    let bound = Duration::from_millis(50);
    let ctl = AdmissionController::new(bound);
    ctl.update_level_files(0, L0_STOP_WRITES_TRIGGER);

    let start = Instant::now();
    match ctl.admit_write() {
        Err(AdmissionError::Stalled { waited }) => {
            assert!(waited >= bound);
            assert!(start.elapsed() >= bound);
        }
        other => panic!("expected Stalled, got {:?}", other),
    }
}

#[test]
fn shutdown_interrupts_a_stalled_writer() {
    let ctl = Arc::new(AdmissionController::new(Duration::from_secs(30)));
    ctl.update_level_files(0, L0_STOP_WRITES_TRIGGER);

    let writer = {
        let ctl = Arc::clone(&ctl);
        thread::spawn(move || ctl.admit_write())
    };

    thread::sleep(Duration::from_millis(50));
    ctl.shutdown();

    assert_eq!(writer.join().unwrap(), Err(AdmissionError::ShutDown));
}

#[test]
fn shutdown_refuses_new_writes() {
    let ctl = AdmissionController::new(Duration::from_secs(5));
    ctl.shutdown();
    assert_eq!(ctl.admit_write(), Err(AdmissionError::ShutDown));
}

#[test]
fn level_file_counts_round_trip() {
    let ctl = AdmissionController::new(Duration::from_secs(5));
    ctl.update_level_files(3, 17);
    assert_eq!(ctl.level_files(3), 17);
    assert_eq!(ctl.level_files(0), 0);
}

// -------------------- Read sampling --------------------

#[test]
fn read_sampling_fires_once_per_period() {
    let ctl = AdmissionController::new(Duration::from_secs(5));

    // Well below the period: no sample.
    assert!(!ctl.record_read_bytes(1, READ_BYTES_PERIOD / 4));
    assert!(!ctl.record_read_bytes(1, READ_BYTES_PERIOD / 4));

    // Crossing the boundary records exactly one sample for the level.
    assert!(ctl.record_read_bytes(2, READ_BYTES_PERIOD / 2));
    let samples = ctl.take_read_samples();
    assert_eq!(samples[2], 1);
    assert_eq!(samples.iter().sum::<u64>(), 1);
}

#[test]
fn read_sampling_attributes_multiple_periods_at_once() {
    let ctl = AdmissionController::new(Duration::from_secs(5));
    assert!(ctl.record_read_bytes(4, READ_BYTES_PERIOD * 3));
    assert_eq!(ctl.take_read_samples()[4], 3);
}

#[test]
fn take_read_samples_drains() {
    let ctl = AdmissionController::new(Duration::from_secs(5));
    ctl.record_read_bytes(0, READ_BYTES_PERIOD);
    assert_eq!(ctl.take_read_samples()[0], 1);
    assert_eq!(ctl.take_read_samples(), [0; NUM_LEVELS]);
}
