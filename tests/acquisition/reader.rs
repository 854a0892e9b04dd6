use crate::common::{config, pattern, session, FakeDebugee};
use memviz::{AcquireConfig, Address, Backend, ByteRange, ChunkedReader, Error, ReadOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASE: u64 = 0x7000;

fn range(len: u64) -> ByteRange {
    ByteRange::new(Address::new(BASE).unwrap(), len).unwrap()
}

#[test]
fn test_read_splits_into_chunks() {
    let memory = pattern(40);
    let debugee = Arc::new(FakeDebugee::with_memory(BASE, memory.clone()));
    let session = session(&debugee, Backend::CppDbg);
    let reader = ChunkedReader::new(&config(16, 4)).unwrap();

    let outcome = reader.read_range(&session, range(40), None).unwrap();

    assert_eq!(debugee.reads(), vec![(0, 16), (16, 16), (32, 8)]);
    assert_eq!(outcome, ReadOutcome::Complete(memory));
}

#[test]
fn test_read_is_independent_of_completion_order() {
    let memory = pattern(1000);
    let mut debugee = FakeDebugee::with_memory(BASE, memory.clone());
    // later chunks complete first
    debugee.read_delay = Some(|offset| Duration::from_millis(50 - offset / 25));
    let debugee = Arc::new(debugee);
    let session = session(&debugee, Backend::CppDbg);
    let reader = ChunkedReader::new(&config(100, 8)).unwrap();

    let outcome = reader.read_range(&session, range(1000), None).unwrap();

    assert_eq!(debugee.reads().len(), 10);
    assert_eq!(outcome, ReadOutcome::Complete(memory));
}

#[test]
fn test_fewer_chunks_than_workers() {
    let memory = pattern(10);
    let debugee = Arc::new(FakeDebugee::with_memory(BASE, memory.clone()));
    let session = session(&debugee, Backend::CppDbg);
    let reader = ChunkedReader::new(&config(8, 8)).unwrap();

    let outcome = reader.read_range(&session, range(10), None).unwrap();

    assert_eq!(debugee.reads(), vec![(0, 8), (8, 2)]);
    assert_eq!(outcome.data(), memory.as_slice());

    let threads = debugee.read_threads();
    assert!((1..=2).contains(&threads.len()), "{threads:?}");
    assert!(threads.iter().all(|name| name.starts_with("memviz-reader-")));
}

#[test]
fn test_oversized_range_refused() {
    let debugee = Arc::new(FakeDebugee::with_memory(BASE, pattern(64)));
    let session = session(&debugee, Backend::CppDbg);
    let reader = ChunkedReader::new(&AcquireConfig {
        max_read_bytes: 32,
        ..config(16, 2)
    })
    .unwrap();

    let err = reader.read_range(&session, range(64), None).unwrap_err();
    assert!(matches!(err, Error::ReadTooLarge { len: 64, limit: 32 }));
    assert!(!err.is_fatal());

    // uninitialized containers report sizes like this
    let err = reader
        .read_range(&session, range(u64::MAX - BASE), None)
        .unwrap_err();
    assert!(matches!(err, Error::ReadTooLarge { .. }));
    assert!(debugee.reads().is_empty());

    let outcome = reader.read_range(&session, range(32), None).unwrap();
    assert_eq!(outcome.data(), &pattern(64)[..32]);
}

#[test]
fn test_empty_range() {
    let debugee = Arc::new(FakeDebugee::with_memory(BASE, vec![]));
    let session = session(&debugee, Backend::CppDbg);
    let reader = ChunkedReader::new(&config(8, 2)).unwrap();

    let outcome = reader.read_range(&session, range(0), None).unwrap();

    assert_eq!(outcome, ReadOutcome::Complete(vec![]));
    assert!(debugee.reads().is_empty());
}

#[test]
fn test_partial_read_reports_missing_ranges() {
    let memory = pattern(40);
    let debugee = Arc::new(FakeDebugee::with_memory(BASE, memory.clone()));
    debugee.fail_read_at(BASE + 16);
    let session = session(&debugee, Backend::CppDbg);
    // single worker: chunks are claimed in order and claiming stops after the failure
    let reader = ChunkedReader::new(&config(16, 1)).unwrap();

    let outcome = reader.read_range(&session, range(40), None).unwrap();

    let ReadOutcome::Partial(partial) = outcome else {
        panic!("partial read expected");
    };
    assert_eq!(partial.data, memory[..16].to_vec());
    assert_eq!(partial.missing, vec![16..40]);
    assert_eq!(debugee.reads(), vec![(0, 16), (16, 16)]);
}

#[test]
fn test_total_failure() {
    let debugee = Arc::new(FakeDebugee::with_memory(BASE, pattern(16)));
    debugee.fail_read_at(BASE);
    let session = session(&debugee, Backend::CppDbg);
    let reader = ChunkedReader::new(&config(16, 2)).unwrap();

    let err = reader.read_range(&session, range(16), None).unwrap_err();

    let Error::TotalReadFailure { reason, len, .. } = err else {
        panic!("total read failure expected");
    };
    assert_eq!(len, 16);
    assert!(reason.contains("cannot access memory at 0x7000"), "{reason}");
}

#[test]
fn test_unmapped_tail() {
    // region ends before the requested range
    let debugee = Arc::new(FakeDebugee::with_memory(BASE, pattern(20)));
    let session = session(&debugee, Backend::CppDbg);
    let reader = ChunkedReader::new(&config(16, 1)).unwrap();

    let outcome = reader.read_range(&session, range(32), None).unwrap();

    let ReadOutcome::Partial(partial) = outcome else {
        panic!("partial read expected");
    };
    assert_eq!(partial.data.len(), 16);
    assert_eq!(partial.missing, vec![16..32]);
}

#[test]
fn test_progress_reports() {
    let debugee = Arc::new(FakeDebugee::with_memory(BASE, pattern(64)));
    let session = session(&debugee, Backend::CppDbg);
    let reader = ChunkedReader::new(&config(16, 3)).unwrap();

    let calls = AtomicUsize::new(0);
    let last = Mutex::new(0.0);
    let progress = |done: f64| {
        calls.fetch_add(1, Ordering::SeqCst);
        let mut last = last.lock().unwrap();
        if done > *last {
            *last = done;
        }
    };
    reader.read_range(&session, range(64), Some(&progress)).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(*last.lock().unwrap(), 1.0);
}
