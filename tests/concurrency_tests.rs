use rolling_hit_counter::{ManualClock, RollingCounter, truncate};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};

const THREADS: u64 = 8;
const HITS_PER_THREAD: u64 = 20_000;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn pinned_clock() -> (ManualClock, SystemTime) {
    let start = truncate(SystemTime::now(), secs(1));
    (ManualClock::new(start), start)
}

#[test]
fn test_concurrent_hits_on_current_bucket() {
    let (clock, _) = pinned_clock();
    let counter = Arc::new(RollingCounter::with_clock(secs(10), secs(1), clock).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..HITS_PER_THREAD {
                    counter.add_hit();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(counter.hits(), THREADS * HITS_PER_THREAD);
}

#[test]
fn test_concurrent_out_of_order_hits() {
    let (clock, start) = pinned_clock();
    let counter = Arc::new(RollingCounter::with_clock(secs(10), secs(1), clock.clone()).unwrap());
    // Leave gaps so threads race on inserting the same buckets.
    clock.advance(secs(6));
    let now = start + secs(6);

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let counter = counter.clone();
            thread::spawn(move || {
                for i in 0..HITS_PER_THREAD {
                    let offset = (i + worker) % 5;
                    counter.add_hit_at(now - secs(offset));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    // Five distinct seconds always fit in a ten slot window.
    assert_eq!(counter.hits(), THREADS * HITS_PER_THREAD);
    let buckets = counter.buckets();
    assert_eq!(buckets.len(), 10);
    for offset in 0..5 {
        let time = now - secs(offset);
        let hits = buckets.iter().find(|(t, _)| *t == time).map(|(_, h)| *h);
        assert_eq!(hits, Some(THREADS * HITS_PER_THREAD / 5), "bucket {}s back", offset);
    }
}

#[test]
fn test_readers_never_see_the_total_shrink() {
    let (clock, _) = pinned_clock();
    let counter = Arc::new(RollingCounter::with_clock(secs(5), secs(1), clock).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let counter = counter.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut last = 0;
            while !done.load(Ordering::Relaxed) {
                let current = counter.hits();
                assert!(current >= last, "total went from {} to {}", last, current);
                last = current;
            }
        })
    };

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..HITS_PER_THREAD {
                    counter.add_hit();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);
    reader.join().unwrap();

    assert_eq!(counter.hits(), 4 * HITS_PER_THREAD);
}

#[test]
fn test_hits_while_clock_advances() {
    let (clock, start) = pinned_clock();
    let counter = Arc::new(RollingCounter::with_clock(secs(4), secs(1), clock.clone()).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let counter = counter.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut recorded = 0u64;
                while !done.load(Ordering::Relaxed) {
                    counter.add_hit();
                    recorded += 1;
                }
                recorded
            })
        })
        .collect();

    for _ in 0..20 {
        thread::sleep(Duration::from_millis(2));
        clock.advance(secs(1));
    }
    done.store(true, Ordering::Relaxed);

    let recorded: u64 = writers.into_iter().map(|h| h.join().unwrap()).sum();
    counter.add_hit();
    let buckets = counter.buckets();

    assert_eq!(buckets.len(), 4);
    assert!(buckets.windows(2).all(|w| w[0].0 > w[1].0));
    assert_eq!(buckets[0].0, start + secs(20));
    assert!(counter.hits() <= recorded + 1);
}
