use crate::clock::{Nanos, from_nanos};
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::time::{Duration, SystemTime};

/// Hits recorded within one resolution-wide interval.
///
/// The timestamp is fixed when the bucket is created; only the hit count
/// changes afterwards, and it does so with a single atomic add.
#[derive(Debug)]
pub(crate) struct Bucket {
    time: Nanos,
    hits: AtomicU64,
}

impl Bucket {
    pub(crate) fn empty(time: Nanos) -> Self {
        Self {
            time,
            hits: AtomicU64::new(0),
        }
    }

    /// A bucket that already carries the hit that caused it to be installed,
    /// so nobody can observe it empty.
    pub(crate) fn with_hit(time: Nanos) -> Self {
        Self {
            time,
            hits: AtomicU64::new(1),
        }
    }

    #[inline]
    pub(crate) fn add_hit(&self) {
        self.hits.fetch_add(1, Release);
    }

    #[inline]
    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Acquire)
    }

    pub(crate) fn time(&self) -> SystemTime {
        from_nanos(self.time)
    }

    #[inline(always)]
    pub(crate) fn time_nanos(&self) -> Nanos {
        self.time
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let since_epoch = self
            .time()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        write!(f, "{} hits at {:?}", self.hits(), since_epoch)
    }
}
