//! Timer example
//!
//! Three deadlines scheduled latest first. They are posted to the pool in
//! deadline order, so the output reads 0, 1, 2.
//!
//! Run with: RUST_LOG=debug cargo run --example timer_example

use rust_concurrent::prelude::*;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Rust Concurrent - Timer Example ===\n");

    let timer = Timer::new(ThreadPool::with_threads(2)?)?;
    let start = Instant::now();

    for secs in [2u64, 1, 0] {
        timer.schedule(Duration::from_secs(secs), move || {
            println!("Hello World {}! ({:.2?})", secs, start.elapsed());
        })?;
    }
    println!("{} deadlines pending", timer.len());

    // Waits for every deadline, then drains the pool
    timer.stop(false)?;

    println!("\nTimer stopped after {:.2?}", start.elapsed());
    Ok(())
}
