//! Bounded Ring Buffer
//!
//! Provides a fixed-capacity FIFO that evicts its oldest entry on overflow.
//! Used as the per-subject feature history feeding sequence assembly.

mod buffer;

pub use buffer::RingBuffer;
