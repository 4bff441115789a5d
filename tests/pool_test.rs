//! Integration tests for thread pool dispatch, scaling and shutdown

use crossbeam_channel::unbounded;
use rust_concurrent::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_each_job_executes_exactly_once() {
    init_logger();
    let pool = ThreadPool::with_threads(4).expect("Failed to create pool");
    let hits: Arc<Vec<AtomicUsize>> = Arc::new((0..500).map(|_| AtomicUsize::new(0)).collect());

    for i in 0..500 {
        let hits = Arc::clone(&hits);
        pool.execute(move || {
            hits[i].fetch_add(1, Ordering::SeqCst);
        })
        .expect("Failed to post job");
    }

    pool.stop(false).expect("Failed to stop pool");
    assert!(hits.iter().all(|hit| hit.load(Ordering::SeqCst) == 1));
}

#[test]
fn test_jobs_queued_before_dispatch_run_in_submission_order() {
    init_logger();
    let pool = ThreadPool::with_threads(0).expect("Failed to create pool");
    let (tx, rx) = unbounded();

    for i in 0..50 {
        let tx = tx.clone();
        pool.execute(move || tx.send(i).expect("Failed to send"))
            .expect("Failed to post job");
    }
    drop(tx);

    pool.scale_threads(1).expect("Failed to scale");
    pool.stop(false).expect("Failed to stop pool");

    let order: Vec<i32> = rx.iter().collect();
    assert_eq!(order, (0..50).collect::<Vec<_>>());
}

#[test]
fn test_scale_to_zero_and_back_keeps_jobs() {
    init_logger();
    let pool = ThreadPool::with_threads(3).expect("Failed to create pool");
    let counter = Arc::new(AtomicUsize::new(0));

    pool.scale_threads(0).expect("Failed to scale to zero");
    assert_eq!(pool.num_threads(), 0);

    for _ in 0..20 {
        let counter = Arc::clone(&counter);
        pool.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("Failed to post job");
    }

    thread::sleep(Duration::from_millis(50));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(pool.queue_len(), 20);

    pool.scale_threads(2).expect("Failed to scale up");
    pool.stop(false).expect("Failed to stop pool");
    assert_eq!(counter.load(Ordering::SeqCst), 20);
}

#[test]
fn test_cancel_all_discards_queued_jobs() {
    init_logger();
    let pool = ThreadPool::with_threads(1).expect("Failed to create pool");
    let gate = Arc::new(Barrier::new(2));
    let ran = Arc::new(AtomicUsize::new(0));

    // Hold the only worker so everything else stays queued
    let gate_clone = Arc::clone(&gate);
    pool.execute(move || {
        gate_clone.wait();
    })
    .expect("Failed to post job");

    for _ in 0..10 {
        let ran = Arc::clone(&ran);
        pool.execute(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .expect("Failed to post job");
    }

    pool.cancel_all();
    assert_eq!(pool.queue_len(), 0);
    assert!(pool.is_running());
    gate.wait();

    // The pool stays usable
    let ran_clone = Arc::clone(&ran);
    pool.execute(move || {
        ran_clone.fetch_add(100, Ordering::SeqCst);
    })
    .expect("Failed to post job");

    pool.stop(false).expect("Failed to stop pool");
    assert_eq!(ran.load(Ordering::SeqCst), 100);
    assert_eq!(pool.stats().get_jobs_discarded(), 10);
}

#[test]
fn test_cancel_all_concurrent_with_post() {
    init_logger();
    let pool = Arc::new(ThreadPool::with_threads(0).expect("Failed to create pool"));
    let ran = Arc::new(AtomicUsize::new(0));

    let poster = {
        let pool = Arc::clone(&pool);
        let ran = Arc::clone(&ran);
        thread::spawn(move || {
            for _ in 0..1000 {
                let ran = Arc::clone(&ran);
                pool.execute(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .expect("Failed to post job");
            }
        })
    };

    for _ in 0..50 {
        pool.cancel_all();
    }
    poster.join().expect("Poster panicked");
    pool.cancel_all();

    pool.scale_threads(2).expect("Failed to scale up");
    pool.stop(false).expect("Failed to stop pool");

    // Everything posted was discarded; nothing ran
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(pool.stats().get_jobs_discarded(), 1000);
}

#[test]
fn test_stop_drain_runs_all_queued() {
    init_logger();
    let pool = ThreadPool::with_threads(2).expect("Failed to create pool");
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..40 {
        let counter = Arc::clone(&counter);
        pool.execute(move || {
            thread::sleep(Duration::from_millis(1));
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("Failed to post job");
    }

    pool.stop(false).expect("Failed to stop pool");
    assert_eq!(counter.load(Ordering::SeqCst), 40);
    assert_eq!(pool.state(), RunState::Stopped);
}

#[test]
fn test_stop_cancel_runs_none_of_queued() {
    init_logger();
    let pool = ThreadPool::with_threads(1).expect("Failed to create pool");
    let gate = Arc::new(Barrier::new(2));
    let ran = Arc::new(AtomicUsize::new(0));

    let gate_clone = Arc::clone(&gate);
    pool.execute(move || {
        gate_clone.wait();
        thread::sleep(Duration::from_millis(50));
    })
    .expect("Failed to post job");
    gate.wait();

    for _ in 0..10 {
        let ran = Arc::clone(&ran);
        pool.execute(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .expect("Failed to post job");
    }

    pool.stop(true).expect("Failed to stop pool");
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(pool.num_threads(), 0);
    assert_eq!(pool.stats().get_jobs_completed(), 1);
}

#[test]
fn test_two_workers_three_sleeping_jobs() {
    init_logger();
    let pool = ThreadPool::with_threads(0).expect("Failed to create pool");
    pool.scale_threads(2).expect("Failed to scale");

    let (tx, rx) = unbounded();
    let start = Instant::now();

    for secs in [2u64, 1, 0] {
        let tx = tx.clone();
        pool.execute(move || {
            thread::sleep(Duration::from_secs(secs));
            tx.send(secs).expect("Failed to send");
        })
        .expect("Failed to post job");
    }
    drop(tx);

    pool.stop(false).expect("Failed to stop pool");
    let elapsed = start.elapsed();

    let mut finished: Vec<u64> = rx.iter().collect();
    finished.sort_unstable();
    assert_eq!(finished, vec![0, 1, 2]);
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
}

#[test]
fn test_concurrent_scale_calls_are_serialized() {
    init_logger();
    let pool = Arc::new(ThreadPool::with_threads(1).expect("Failed to create pool"));

    let handles: Vec<_> = [5usize, 2, 8, 0, 3]
        .into_iter()
        .map(|n| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.scale_threads(n).expect("Failed to scale"))
        })
        .collect();
    for handle in handles {
        handle.join().expect("Scaler panicked");
    }

    // Whatever ran last won; the count must be one of the requested sizes
    assert!([5, 2, 8, 0, 3].contains(&pool.num_threads()));

    pool.scale_threads(4).expect("Failed to scale");
    assert_eq!(pool.num_threads(), 4);
    pool.stop(true).expect("Failed to stop pool");
}

#[test]
fn test_custom_thread_factory() {
    init_logger();
    let spawned = Arc::new(AtomicUsize::new(0));
    let spawned_clone = Arc::clone(&spawned);

    let factory = move |id: usize, body: WorkerBody| -> Result<Thread> {
        spawned_clone.fetch_add(1, Ordering::SeqCst);
        NamedThreadFactory::new("custom").spawn(id, body)
    };

    let config = ThreadPoolConfig::new(2).with_thread_factory(Arc::new(factory));
    let pool = ThreadPool::with_config(config).expect("Failed to create pool");
    pool.scale_threads(5).expect("Failed to scale");

    let (tx, rx) = unbounded();
    pool.execute(move || {
        let name = thread::current().name().map(str::to_string);
        tx.send(name).expect("Failed to send");
    })
    .expect("Failed to post job");

    let name = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("Job did not report")
        .expect("Thread should be named");
    assert!(name.starts_with("custom-"));
    assert_eq!(spawned.load(Ordering::SeqCst), 5);

    pool.stop(true).expect("Failed to stop pool");
}

#[test]
fn test_pool_through_trait_object() {
    init_logger();
    let pool: Box<dyn Pool> = Box::new(ThreadPool::with_threads(2).expect("Failed to create pool"));
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        pool.post(work(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .expect("Failed to post job");
    }

    pool.stop(false).expect("Failed to stop pool");
    assert_eq!(counter.load(Ordering::SeqCst), 10);
    assert!(matches!(
        pool.post(work(|| {})),
        Err(ThreadError::Stopped { .. })
    ));
}

#[test]
fn test_stop_cancel_cuts_running_drain_short() {
    init_logger();
    let pool = Arc::new(ThreadPool::with_threads(1).expect("Failed to create pool"));
    let gate = Arc::new(Barrier::new(2));
    let ran = Arc::new(AtomicUsize::new(0));

    // Keep the only worker busy so the slow jobs stay queued
    let gate_clone = Arc::clone(&gate);
    pool.execute(move || {
        gate_clone.wait();
        thread::sleep(Duration::from_millis(300));
    })
    .expect("Failed to post job");
    gate.wait();

    for _ in 0..10 {
        let ran = Arc::clone(&ran);
        pool.execute(move || {
            thread::sleep(Duration::from_millis(200));
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .expect("Failed to post job");
    }

    let drainer = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.stop(false))
    };
    thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    pool.stop(true).expect("Failed to stop pool");
    let elapsed = start.elapsed();

    drainer
        .join()
        .expect("Drainer panicked")
        .expect("Draining stop failed");

    // A full drain would take more than two seconds
    assert!(elapsed < Duration::from_secs(1), "took {:?}", elapsed);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(pool.stats().get_jobs_discarded(), 10);
    assert_eq!(pool.state(), RunState::Stopped);
}

#[test]
fn test_post_racing_stop_is_never_lost() {
    init_logger();
    let pool = Arc::new(ThreadPool::with_threads(2).expect("Failed to create pool"));
    let ran = Arc::new(AtomicUsize::new(0));

    let poster = {
        let pool = Arc::clone(&pool);
        let ran = Arc::clone(&ran);
        thread::spawn(move || {
            let mut accepted = 0u64;
            loop {
                let ran = Arc::clone(&ran);
                match pool.execute(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                }) {
                    Ok(()) => accepted += 1,
                    Err(e) => {
                        assert!(matches!(e, ThreadError::Stopped { .. }));
                        return accepted;
                    }
                }
            }
        })
    };

    thread::sleep(Duration::from_millis(20));
    pool.stop(true).expect("Failed to stop pool");
    let accepted = poster.join().expect("Poster panicked");

    let stats = pool.stats().snapshot();
    assert_eq!(stats.jobs_posted, accepted);
    assert_eq!(stats.jobs_posted, stats.jobs_completed + stats.jobs_discarded);
    assert_eq!(stats.jobs_completed, ran.load(Ordering::SeqCst) as u64);
    assert_eq!(stats.jobs_rejected, 1);
    assert_eq!(stats.pending(), 0);
}

#[test]
fn test_panicked_worker_leaves_thread_count() {
    init_logger();
    let pool = ThreadPool::with_threads(2).expect("Failed to create pool");

    pool.execute(|| panic!("Intentional panic for testing"))
        .expect("Failed to post job");

    let start = Instant::now();
    while pool.num_threads() != 1 {
        assert!(start.elapsed() < Duration::from_secs(2), "count never dropped");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(pool.stats().get_jobs_panicked(), 1);

    pool.scale_threads(2).expect("Failed to rescale");
    assert_eq!(pool.num_threads(), 2);
    pool.stop(false).expect("Failed to stop pool");
    assert_eq!(pool.num_threads(), 0);
}
