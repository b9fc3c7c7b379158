//! End-to-end lifecycle: singleton gate, pool startup, work, shutdown.

use std::sync::mpsc;
use std::time::Duration;

use workpool::{ProcessError, Processor, ProcessorPool, WorkerPool};
use workpool::sync::guard::ProcessGuard;

/// Sums its input, standing in for a heavyweight processing engine.
#[derive(Debug, Default)]
struct ChecksumProcessor;

impl Processor for ChecksumProcessor {
    fn create() -> Self {
        Self
    }

    fn process(&mut self, data: &[u8]) -> Result<(), ProcessError> {
        if data.is_empty() {
            return Err(ProcessError::new("empty input"));
        }
        let _sum: u64 = data.iter().map(|&b| u64::from(b)).sum();
        Ok(())
    }
}

#[test]
fn guarded_entry_flow_runs_one_task_and_shuts_down() {
    let name = format!("workpool-lifecycle-{}", std::process::id());
    let guard = ProcessGuard::acquire(&name)
        .expect("guard file should open")
        .expect("no other instance should hold the test guard");

    let pool = WorkerPool::new(4).expect("positive worker count");

    let (tx, rx) = mpsc::channel();
    pool.submit(move || tx.send("X").unwrap())
        .expect("running pool accepts work");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "X");

    pool.shutdown();
    assert!(pool.is_disposed());
    assert_eq!(pool.stats().tasks_completed, 1);

    drop(guard);
}

#[test]
fn worker_pool_feeds_a_processor_pool() {
    let pool = WorkerPool::new(2).expect("positive worker count");
    let processors = ProcessorPool::<ChecksumProcessor>::new();

    let (tx, rx) = mpsc::channel();
    for chunk in [&b"alpha"[..], &b"beta"[..], &b"gamma"[..], &b"delta"[..]] {
        let processors = processors.clone();
        let tx = tx.clone();
        pool.submit(move || {
            tx.send(processors.process(chunk).is_ok()).unwrap();
        })
        .expect("running pool accepts work");
    }

    for _ in 0..4 {
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }

    pool.shutdown();

    // Two workers means at most two processors were ever needed.
    assert!(processors.created_count() <= 2);
    assert_eq!(processors.available_count(), processors.created_count());
}
