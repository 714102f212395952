//! Size-adaptive circular buffer.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::BufferConfig;
use crate::error::{BufferError, ConfigError};
use crate::hold::Hold;
use crate::no_shift::NoShift;
use crate::policy::{PolicyKind, ResizePolicy};
use crate::ring::BlockRing;
use crate::shift::Shift;

/// A FIFO queue of `Copy` units whose storage grows and shrinks one block at
/// a time.
///
/// Capacity is allocated in blocks of `block_size` units, up to
/// `maximum_buffer_size` (rounded up to whole blocks). When and how blocks
/// are added or released is decided by the resize policy `P`.
///
/// # Semantics
///
/// - **Write**: Fails with [`BufferError::CapacityExhausted`] when the buffer
///   holds `maximum_buffer_size` units, never overwrites
/// - **Read**: Fails with [`BufferError::Empty`] when no data is held
/// - **Slots**: Every slot not holding data holds the placeholder value
///
/// The buffer has no internal synchronization; it is `Send` when the unit and
/// the policy are, and `&mut self` serializes access.
///
/// # Example
///
/// ```
/// use blockring_buffer::{BufferError, ShiftBuffer};
///
/// let mut buf = ShiftBuffer::new(2, 4, -1i32).unwrap();
/// for v in 1..=4 {
///     buf.write(v).unwrap();
/// }
/// assert_eq!(buf.write(5), Err(BufferError::CapacityExhausted { maximum: 4 }));
/// assert_eq!(buf.read(), Ok(1));
/// ```
pub struct CircularBuffer<T, P = Shift> {
    ring: BlockRing<T>,
    policy: P,
}

/// Buffer that shifts data on resize and never keeps a spare block.
pub type ShiftBuffer<T> = CircularBuffer<T, Shift>;

/// Buffer that resizes without moving data, keeping one reserve block.
pub type NoShiftBuffer<T> = CircularBuffer<T, NoShift>;

/// Non-shifting buffer that delays shrinking for a hold window.
pub type HoldBuffer<T> = CircularBuffer<T, Hold>;

/// Buffer whose policy is selected at runtime.
pub type DynBuffer<T> = CircularBuffer<T, Box<dyn ResizePolicy<T> + Send>>;

/// Point-in-time sizes and lifetime block counters of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    pub data_size: usize,
    pub buffer_size: usize,
    pub block_count: usize,
    pub maximum_buffer_size: usize,
    pub blocks_allocated: u64,
    pub blocks_released: u64,
}

impl<T: Copy, P: ResizePolicy<T>> CircularBuffer<T, P> {
    /// Creates a buffer driven by `policy`.
    ///
    /// Fails if `policy` rejects `config`; no buffer exists in that case.
    pub fn with_policy(
        config: BufferConfig,
        placeholder: T,
        mut policy: P,
    ) -> Result<Self, ConfigError> {
        policy.validate(&config)?;
        let mut ring = BlockRing::new(&config, placeholder);
        policy.on_prepare(&mut ring);
        debug!(
            policy = policy.name(),
            block_size = ring.block_size(),
            maximum = ring.maximum_buffer_size(),
            "buffer created"
        );
        Ok(Self { ring, policy })
    }

    /// Appends one unit.
    ///
    /// Returns [`BufferError::CapacityExhausted`] without changing the
    /// contents when the buffer already holds `maximum_buffer_size` units.
    pub fn write(&mut self, unit: T) -> Result<(), BufferError> {
        let result = if self.ring.data_size() == self.ring.maximum_buffer_size() {
            Err(BufferError::CapacityExhausted {
                maximum: self.ring.maximum_buffer_size(),
            })
        } else {
            self.policy.on_write(&mut self.ring);
            self.ring.push(unit);
            Ok(())
        };
        self.policy.on_settle(&mut self.ring);
        result
    }

    /// Removes and returns the oldest unit.
    ///
    /// Returns [`BufferError::Empty`] when the buffer holds no data.
    pub fn read(&mut self) -> Result<T, BufferError> {
        let result = if self.ring.data_size() == 0 {
            Err(BufferError::Empty)
        } else {
            let unit = self.ring.pop();
            self.policy.on_read(&mut self.ring);
            Ok(unit)
        };
        self.policy.on_settle(&mut self.ring);
        result
    }

    /// Drops all data and blocks and returns the buffer to its freshly
    /// constructed state. Lifetime block counters are kept.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.policy.on_prepare(&mut self.ring);
        debug!(policy = self.policy.name(), "buffer reset");
    }

    /// Returns the held units in FIFO order.
    pub fn to_vec(&self) -> Vec<T> {
        self.ring.iter().collect()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            data_size: self.ring.data_size(),
            buffer_size: self.ring.buffer_size(),
            block_count: self.ring.block_count(),
            maximum_buffer_size: self.ring.maximum_buffer_size(),
            blocks_allocated: self.ring.blocks_allocated(),
            blocks_released: self.ring.blocks_released(),
        }
    }

    /// Number of units currently held.
    pub fn data_size(&self) -> usize {
        self.ring.data_size()
    }

    /// Allocated capacity in units, always a multiple of the block size.
    pub fn buffer_size(&self) -> usize {
        self.ring.buffer_size()
    }

    pub fn block_count(&self) -> usize {
        self.ring.block_count()
    }

    pub fn block_size(&self) -> usize {
        self.ring.block_size()
    }

    /// Capacity ceiling, rounded up to whole blocks.
    pub fn maximum_buffer_size(&self) -> usize {
        self.ring.maximum_buffer_size()
    }

    pub fn placeholder(&self) -> T {
        self.ring.placeholder()
    }

    /// Allocated but unused capacity.
    pub fn slack(&self) -> usize {
        self.ring.slack()
    }

    pub fn len(&self) -> usize {
        self.ring.data_size()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.data_size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.ring.data_size() == self.ring.maximum_buffer_size()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<T: Copy> ShiftBuffer<T> {
    /// Creates a shifting buffer.
    pub fn new(
        block_size: usize,
        maximum_buffer_size: usize,
        placeholder: T,
    ) -> Result<Self, ConfigError> {
        Self::with_policy(
            BufferConfig::new(block_size, maximum_buffer_size),
            placeholder,
            Shift,
        )
    }
}

impl<T: Copy> NoShiftBuffer<T> {
    /// Creates a non-shifting buffer with one block pre-allocated.
    pub fn new(
        block_size: usize,
        maximum_buffer_size: usize,
        placeholder: T,
    ) -> Result<Self, ConfigError> {
        Self::with_policy(
            BufferConfig::new(block_size, maximum_buffer_size),
            placeholder,
            NoShift,
        )
    }
}

impl<T: Copy> HoldBuffer<T> {
    /// Creates a hold buffer with the default hold window.
    pub fn new(
        block_size: usize,
        maximum_buffer_size: usize,
        placeholder: T,
    ) -> Result<Self, ConfigError> {
        Self::with_policy(
            BufferConfig::new(block_size, maximum_buffer_size),
            placeholder,
            Hold::new(),
        )
    }

    /// Creates a hold buffer that waits `hold_window` operations before
    /// shrinking.
    pub fn with_hold_window(
        block_size: usize,
        maximum_buffer_size: usize,
        placeholder: T,
        hold_window: usize,
    ) -> Result<Self, ConfigError> {
        Self::with_policy(
            BufferConfig::new(block_size, maximum_buffer_size),
            placeholder,
            Hold::with_window(hold_window),
        )
    }

    /// Operations the requirement must stay low before blocks are released.
    pub fn hold_window(&self) -> usize {
        self.policy.hold_window_for(self.ring.block_size())
    }
}

impl<T: Copy> DynBuffer<T> {
    /// Creates a buffer with the policy named by `kind`. `hold_window` only
    /// applies to [`PolicyKind::Hold`].
    pub fn from_kind(
        config: BufferConfig,
        placeholder: T,
        kind: PolicyKind,
        hold_window: Option<usize>,
    ) -> Result<Self, ConfigError> {
        Self::with_policy(config, placeholder, kind.into_policy(hold_window))
    }
}

impl<T: Copy, P: ResizePolicy<T>> fmt::Debug for CircularBuffer<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularBuffer")
            .field("policy", &self.policy.name())
            .field("data_size", &self.ring.data_size())
            .field("buffer_size", &self.ring.buffer_size())
            .field("block_size", &self.ring.block_size())
            .field("maximum_buffer_size", &self.ring.maximum_buffer_size())
            .finish()
    }
}
