//! Size-adaptive circular buffers.
//!
//! A [`CircularBuffer`] is a FIFO queue of fixed-size `Copy` units whose
//! storage is a circle of equally sized blocks. Blocks are added as data
//! arrives and released as it drains, always next to the read or write
//! cursor, so memory follows occupancy up to a hard ceiling.
//!
//! # Resize Policies
//!
//! The [`ResizePolicy`] decides when the block circle changes:
//!
//! - [`ShiftBuffer<T>`]: grows only when full and shrinks as soon as a whole
//!   block is free, moving at most one block of data to keep the free region
//!   contiguous. Holds no blocks while empty.
//! - [`NoShiftBuffer<T>`]: never moves data. Keeps up to one empty reserve
//!   block and always at least one block.
//! - [`HoldBuffer<T>`]: grows like `NoShiftBuffer` and only shrinks after the
//!   demand has stayed low for a hold window, which damps oscillation.
//!
//! ```
//! use blockring_buffer::{BufferError, NoShiftBuffer};
//!
//! let mut buf = NoShiftBuffer::new(32, 1024, -1i8).unwrap();
//! assert_eq!(buf.buffer_size(), 32);
//!
//! for v in 0..40 {
//!     buf.write(v).unwrap();
//! }
//! assert_eq!(buf.block_count(), 3);
//! assert_eq!(buf.read(), Ok(0));
//! ```
//!
//! # Runtime Selection
//!
//! [`PolicyKind`] names a policy in configuration files and builds a
//! [`DynBuffer<T>`]:
//!
//! ```
//! use blockring_buffer::{BufferConfig, DynBuffer, PolicyKind};
//!
//! let kind: PolicyKind = "hold".parse().unwrap();
//! let mut buf = DynBuffer::from_kind(BufferConfig::new(4, 16), 0u16, kind, Some(64)).unwrap();
//! buf.write(7).unwrap();
//! assert_eq!(buf.stats().data_size, 1);
//! ```
//!
//! # Thread Safety
//!
//! Buffers carry no locks. They are `Send` and every operation takes
//! `&mut self`; share one across threads behind a `Mutex`.

mod buffer;
mod config;
mod error;
mod hold;
mod no_shift;
mod policy;
mod ring;
mod shift;

pub use buffer::{BufferStats, CircularBuffer, DynBuffer, HoldBuffer, NoShiftBuffer, ShiftBuffer};
pub use config::{BufferConfig, DEFAULT_BLOCK_SIZE, DEFAULT_MAXIMUM_BUFFER_SIZE};
pub use error::{BufferError, ConfigError};
pub use hold::{DEFAULT_HOLD_FACTOR, Hold};
pub use no_shift::NoShift;
pub use policy::{PolicyKind, ResizePolicy};
pub use ring::BlockRing;
pub use shift::Shift;
