//! Thread pool example
//!
//! Two workers, three jobs sleeping 2s, 1s and 0s. A draining stop blocks
//! until all three have printed, about two seconds in total.
//!
//! Run with: RUST_LOG=debug cargo run --example thread_pool_example

use rust_concurrent::prelude::*;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Rust Concurrent - Thread Pool Example ===\n");

    let pool: Box<dyn Pool> = Box::new(ThreadPool::with_threads(0)?);
    pool.scale_threads(2)?;

    let start = Instant::now();
    for secs in [2u64, 1, 0] {
        pool.post(work(move || {
            thread::sleep(Duration::from_secs(secs));
            println!("Hello World {}!", secs);
        }))?;
    }

    pool.stop(false)?;

    println!("\nAll jobs finished after {:.2?}", start.elapsed());
    Ok(())
}
