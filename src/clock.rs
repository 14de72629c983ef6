use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Signed nanoseconds relative to the Unix epoch.
pub(crate) type Nanos = i128;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A source of the current instant.
///
/// Counters take their clock at construction, so a test can drive several
/// counters from independent simulated clocks in the same process.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant: hand one clone to a counter and keep the
/// other to pin or advance "now" from the test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Starts at the current wall-clock instant.
    pub fn starting_now() -> Self {
        Self::new(SystemTime::now())
    }

    pub fn set(&self, instant: SystemTime) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now(&self) -> SystemTime {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> SystemTime {
        (**self).now()
    }
}

/// Floors `instant` to the greatest multiple of `resolution` (counted from the
/// Unix epoch) that does not exceed it. A zero resolution leaves it unchanged.
pub fn truncate(instant: SystemTime, resolution: Duration) -> SystemTime {
    match Nanos::try_from(resolution.as_nanos()) {
        Ok(step) if step > 0 => from_nanos(truncate_nanos(to_nanos(instant), step)),
        _ => instant,
    }
}

#[inline]
pub(crate) fn truncate_nanos(nanos: Nanos, step: Nanos) -> Nanos {
    nanos - nanos.rem_euclid(step)
}

pub(crate) fn to_nanos(instant: SystemTime) -> Nanos {
    match instant.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as Nanos,
        Err(before) => -(before.duration().as_nanos() as Nanos),
    }
}

pub(crate) fn from_nanos(nanos: Nanos) -> SystemTime {
    let magnitude = nanos.unsigned_abs();
    let offset = Duration::new(
        (magnitude / NANOS_PER_SEC) as u64,
        (magnitude % NANOS_PER_SEC) as u32,
    );
    if nanos >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}
