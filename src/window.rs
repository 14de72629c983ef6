use crate::bucket::Bucket;
use crate::clock::Nanos;
use std::collections::VecDeque;
use std::fmt;

/// What [`Window::record`] did with a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Record {
    /// Counted in the newest bucket.
    Front,
    /// Counted in an existing older bucket.
    Matched,
    /// A newer bucket was pushed to the front and the tail bucket evicted.
    Advanced { evicted: Nanos },
    /// A bucket was inserted at `at` and the tail bucket evicted.
    Inserted { at: usize, evicted: Nanos },
    /// Older than every retained bucket; dropped.
    Expired,
}

/// The slot ring: a fixed number of buckets ordered newest first, with
/// strictly descending timestamps.
///
/// Capacity never changes after construction. Every structural change pops
/// the tail before installing the new bucket, so the deque never reallocates.
#[derive(Debug)]
pub(crate) struct Window {
    buckets: VecDeque<Bucket>,
}

impl Window {
    /// Builds a pre-aged window of `num_slots` empty buckets ending at `newest`.
    pub(crate) fn new(newest: Nanos, resolution: Nanos, num_slots: usize) -> Self {
        debug_assert!(num_slots > 1, "window needs at least two slots, got {}", num_slots);
        let mut buckets = VecDeque::with_capacity(num_slots);
        let mut time = newest;
        for _ in 0..num_slots {
            buckets.push_back(Bucket::empty(time));
            time -= resolution;
        }
        Self { buckets }
    }

    #[inline]
    fn newest(&self) -> &Bucket {
        &self.buckets[0]
    }

    #[inline]
    fn oldest(&self) -> &Bucket {
        &self.buckets[self.buckets.len() - 1]
    }

    /// Counts a hit in the newest bucket if `time` is its timestamp.
    ///
    /// Needs only shared access: it never changes the structure.
    #[inline]
    pub(crate) fn hit_newest(&self, time: Nanos) -> bool {
        let newest = self.newest();
        if newest.time_nanos() == time {
            newest.add_hit();
            return true;
        }
        false
    }

    /// Counts a hit at an already truncated `time`, advancing or reshaping the
    /// ring when no bucket holds that timestamp yet.
    pub(crate) fn record(&mut self, time: Nanos) -> Record {
        if self.hit_newest(time) {
            return Record::Front;
        }

        if time > self.newest().time_nanos() {
            let evicted = self.evict_oldest();
            self.buckets.push_front(Bucket::with_hit(time));
            return Record::Advanced { evicted };
        }

        if time < self.oldest().time_nanos() {
            return Record::Expired;
        }

        // First bucket whose time is not after `time`. Exists because the
        // oldest bucket is not after it.
        let at = self.buckets.partition_point(|b| b.time_nanos() > time);
        let bucket = &self.buckets[at];
        if bucket.time_nanos() == time {
            bucket.add_hit();
            return Record::Matched;
        }

        let evicted = self.evict_oldest();
        self.buckets.insert(at, Bucket::with_hit(time));
        Record::Inserted { at, evicted }
    }

    fn evict_oldest(&mut self) -> Nanos {
        self.buckets
            .pop_back()
            .map(|bucket| bucket.time_nanos())
            .unwrap_or(Nanos::MIN)
    }

    /// Sums the buckets not older than `cutoff`.
    ///
    /// Stops at the first older bucket, which relies on the strict ordering.
    pub(crate) fn hits_since(&self, cutoff: Nanos) -> u64 {
        self.buckets
            .iter()
            .take_while(|bucket| bucket.time_nanos() >= cutoff)
            .map(Bucket::hits)
            .sum()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ ")?;
        for (i, bucket) in self.buckets.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", bucket)?;
        }
        write!(f, " ]")
    }
}
