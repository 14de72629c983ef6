use clap::Parser;
use hdrhistogram::Histogram;
use rolling_hit_counter::{CounterOptions, RollingCounter, SystemClock};
use spdlog::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Hammers one shared counter from several threads and reports the rolling
/// total as the window moves.
#[derive(Parser)]
struct Args {
    /// Number of threads recording hits.
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Rolling window, in seconds.
    #[arg(long, default_value_t = 5)]
    window_secs: u64,

    /// Bucket width, in milliseconds.
    #[arg(long, default_value_t = 500)]
    resolution_ms: u64,

    /// How long to run, in seconds.
    #[arg(long, default_value_t = 10)]
    run_secs: u64,

    /// Pause between two hits of the same thread, in microseconds.
    #[arg(long, default_value_t = 50)]
    pause_us: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let options = CounterOptions {
        duration: Duration::from_secs(args.window_secs),
        resolution: Duration::from_millis(args.resolution_ms),
    };
    let counter = Arc::new(RollingCounter::with_options(options, SystemClock)?);
    let running = Arc::new(AtomicBool::new(true));
    let recorded = Arc::new(AtomicU64::new(0));

    info!(
        "[HitLoad] {} threads, window {:?} in {} slots",
        args.threads,
        counter.duration(),
        counter.num_slots()
    );

    let mut workers = Vec::with_capacity(args.threads);
    for _ in 0..args.threads {
        let counter = counter.clone();
        let running = running.clone();
        let recorded = recorded.clone();
        let pause = Duration::from_micros(args.pause_us);
        let mut histogram = Histogram::<u64>::new_with_bounds(1, 1_000_000_000, 3)?;
        workers.push(thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                let start = Instant::now();
                counter.add_hit();
                histogram.saturating_record(start.elapsed().as_nanos() as u64);
                recorded.fetch_add(1, Ordering::Relaxed);
                if !pause.is_zero() {
                    thread::sleep(pause);
                }
            }
            histogram
        }));
    }

    let started = Instant::now();
    let run_for = Duration::from_secs(args.run_secs);
    while started.elapsed() < run_for {
        thread::sleep(options.resolution);
        info!(
            "[HitLoad] t={:>6.2}s in window: {:>10} recorded: {:>10}",
            started.elapsed().as_secs_f64(),
            counter.hits(),
            recorded.load(Ordering::Relaxed)
        );
    }
    running.store(false, Ordering::Relaxed);

    let mut latency = Histogram::<u64>::new_with_bounds(1, 1_000_000_000, 3)?;
    for worker in workers {
        let histogram = worker.join().map_err(|_| "worker panicked")?;
        latency.add(histogram)?;
    }

    info!(
        "[HitLoad] add_hit latency: p50={}ns p99={}ns p999={}ns max={}ns over {} calls",
        latency.value_at_quantile(0.5),
        latency.value_at_quantile(0.99),
        latency.value_at_quantile(0.999),
        latency.max(),
        latency.len()
    );
    debug!("[HitLoad] final window: {}", counter);

    Ok(())
}
