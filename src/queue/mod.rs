//! # Scheduler queue: bounded, controllable delay between arrival and departure.
//!
//! - [`TimeBoundedQueue`]: concurrent delay queue with one timer task.
//! - [`DelayWindow`]: `[min, max]` delay an item may wait.
//! - [`DelayPick`]: how the due instant is chosen inside the window.
//!
//! A `[0, 0]` window degenerates to FIFO passthrough; wider windows let items
//! from different producers overtake each other.

mod time_bounded;
mod window;

pub use time_bounded::{Dequeued, QueueSettings, TimeBoundedQueue};
pub use window::{DelayPick, DelayWindow};
