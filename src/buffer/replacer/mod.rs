//! Eviction policy implementations (replacers).
//!
//! - [`ClockReplacer`] - second-chance clock over the frame descriptors

mod clock;

pub use clock::ClockReplacer;
