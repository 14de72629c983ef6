use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CounterError {
    /// The duration is not a multiple of the resolution greater than one.
    #[error(
        "counter duration {duration:?} must be a multiple of its resolution {resolution:?} spanning at least two slots"
    )]
    InvalidDuration {
        duration: Duration,
        resolution: Duration,
    },
}
