use crate::clock::{Clock, Nanos, SystemClock, from_nanos, to_nanos, truncate_nanos};
use crate::error::CounterError;
use crate::window::{Record, Window};
use spdlog::{debug, trace};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

/// Shape of a [`RollingCounter`]'s window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterOptions {
    /// Span over which hits stay counted.
    pub duration: Duration,
    /// Width of a single bucket. Must divide `duration` at least twice.
    pub resolution: Duration,
}

impl CounterOptions {
    /// Number of buckets the window will hold, or `InvalidDuration` when the
    /// duration is not a multiple of the resolution greater than one.
    pub fn num_slots(&self) -> Result<u32, CounterError> {
        let invalid = CounterError::InvalidDuration {
            duration: self.duration,
            resolution: self.resolution,
        };
        let duration = self.duration.as_nanos();
        let resolution = self.resolution.as_nanos();
        if resolution == 0 || duration <= resolution || duration % resolution != 0 {
            return Err(invalid);
        }
        u32::try_from(duration / resolution).map_err(|_| invalid)
    }
}

impl Default for CounterOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5 * 60),
            resolution: Duration::from_secs(60),
        }
    }
}

/// Counts hits over a rolling window of fixed duration.
///
/// Memory is fixed at construction: `duration / resolution` buckets, newest
/// first. The window only moves when a hit is recorded; nothing runs in the
/// background.
///
/// ## Concurrency
///
/// The bucket ring sits behind a reader/writer lock while bucket counts are
/// atomics. Hits landing in the newest bucket take the lock shared and never
/// serialize against each other. Advancing the window, inserting an
/// out-of-order bucket or matching an older one takes it exclusively.
/// [`hits`](Self::hits) reads under the shared lock and never sees a window
/// halfway through a shift.
///
/// ```
/// use rolling_hit_counter::{ManualClock, RollingCounter};
/// use std::time::Duration;
///
/// let clock = ManualClock::starting_now();
/// let counter = RollingCounter::with_clock(
///     Duration::from_secs(5),
///     Duration::from_secs(1),
///     clock.clone(),
/// )
/// .unwrap();
///
/// counter.add_hit();
/// counter.add_hit();
/// assert_eq!(counter.hits(), 2);
///
/// clock.advance(Duration::from_secs(6));
/// assert_eq!(counter.hits(), 0);
/// ```
#[derive(Debug)]
pub struct RollingCounter<C: Clock = SystemClock> {
    window: RwLock<Window>,
    resolution: Duration,
    resolution_nanos: Nanos,
    num_slots: u32,
    clock: C,
}

impl RollingCounter {
    /// Creates a counter driven by the system clock.
    ///
    /// `RollingCounter::new(Duration::from_secs(300), Duration::from_secs(60))`
    /// tracks hits over a rolling five minutes in five buckets.
    pub fn new(duration: Duration, resolution: Duration) -> Result<Self, CounterError> {
        Self::with_clock(duration, resolution, SystemClock)
    }
}

impl<C: Clock> RollingCounter<C> {
    pub fn with_clock(
        duration: Duration,
        resolution: Duration,
        clock: C,
    ) -> Result<Self, CounterError> {
        Self::with_options(
            CounterOptions {
                duration,
                resolution,
            },
            clock,
        )
    }

    pub fn with_options(options: CounterOptions, clock: C) -> Result<Self, CounterError> {
        let num_slots = options.num_slots()?;
        let resolution_nanos = options.resolution.as_nanos() as Nanos;
        let newest = truncate_nanos(to_nanos(clock.now()), resolution_nanos);

        debug!(
            "Rolling counter created: {} slots of {:?}, window {:?}",
            num_slots, options.resolution, options.duration
        );

        Ok(Self {
            window: RwLock::new(Window::new(newest, resolution_nanos, num_slots as usize)),
            resolution: options.resolution,
            resolution_nanos,
            num_slots,
            clock,
        })
    }

    /// Records a hit at the current instant.
    #[inline]
    pub fn add_hit(&self) {
        self.add_hit_at(self.clock.now());
    }

    /// Records a hit that happened at `time`.
    ///
    /// Useful when hits are reported late. A hit older than every retained
    /// bucket can never be counted and is dropped silently.
    pub fn add_hit_at(&self, time: SystemTime) {
        let time = truncate_nanos(to_nanos(time), self.resolution_nanos);
        if self.read_window().hit_newest(time) {
            return;
        }

        // The write path re-checks the newest bucket: another caller may have
        // installed it between the two locks.
        let record = self.write_window().record(time);
        match record {
            Record::Advanced { evicted } => {
                trace!("Window advanced, evicted bucket at {:?}", from_nanos(evicted));
            }
            Record::Inserted { at, evicted } => {
                trace!(
                    "Inserted bucket at slot {}, evicted bucket at {:?}",
                    at,
                    from_nanos(evicted)
                );
            }
            Record::Expired => {
                trace!(
                    "Dropped hit at {:?}: older than the retained window",
                    from_nanos(time)
                );
            }
            Record::Front | Record::Matched => {}
        }
    }

    /// Total hits within the window ending now.
    ///
    /// Buckets exactly at `now - duration` still count.
    pub fn hits(&self) -> u64 {
        let cutoff = self.now() - self.resolution_nanos * Nanos::from(self.num_slots);
        self.read_window().hits_since(cutoff)
    }

    pub fn duration(&self) -> Duration {
        self.resolution * self.num_slots
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots as usize
    }

    /// Snapshot of every bucket, newest first.
    pub fn buckets(&self) -> Vec<(SystemTime, u64)> {
        self.read_window()
            .iter()
            .map(|bucket| (bucket.time(), bucket.hits()))
            .collect()
    }

    fn now(&self) -> Nanos {
        truncate_nanos(to_nanos(self.clock.now()), self.resolution_nanos)
    }

    // A panic never leaves the ring half-shifted, so a poisoned lock is safe to reuse.
    fn read_window(&self) -> RwLockReadGuard<'_, Window> {
        self.window.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_window(&self) -> RwLockWriteGuard<'_, Window> {
        self.window.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock> fmt::Display for RollingCounter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.read_window())
    }
}
