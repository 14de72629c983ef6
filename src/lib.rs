mod bucket;
mod clock;
mod counter;
mod error;
mod window;

pub use crate::clock::{Clock, ManualClock, SystemClock, truncate};
pub use crate::counter::{CounterOptions, RollingCounter};
pub use crate::error::CounterError;
