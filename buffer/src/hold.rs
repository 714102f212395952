//! Hysteresis resize policy on top of [`NoShift`].

use tracing::trace;

use crate::config::BufferConfig;
use crate::error::ConfigError;
use crate::no_shift::NoShift;
use crate::policy::{ResizePolicy, sealed};
use crate::ring::BlockRing;

/// Hold window per unit of block size when no explicit window is set.
pub const DEFAULT_HOLD_FACTOR: usize = 128;

/// Grows like [`NoShift`] but delays shrinking until demand has stayed low.
///
/// After every operation the policy computes
/// `required = ceil(data_size / block_size) + 1` and compares it with the
/// last accepted requirement (the hold value). While `required` stays below
/// the hold value a counter runs; once it has run for the whole hold window,
/// the hold value drops to `required` and every drained block before the read
/// cursor is released in one pass. Any operation that brings `required` back
/// up to the hold value restarts the count, so bursty traffic does not make
/// the buffer flap between sizes.
///
/// # Example
///
/// ```
/// use blockring_buffer::HoldBuffer;
///
/// let mut buf = HoldBuffer::new(4, 64, -1i32).unwrap();
/// for v in 0..20 {
///     buf.write(v).unwrap();
/// }
/// let grown = buf.buffer_size();
/// while buf.read().is_ok() {}
/// // Draining alone does not give memory back.
/// assert_eq!(buf.buffer_size(), grown);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hold {
    window: Option<usize>,
    required_blocks: usize,
    hold_value: usize,
    hold_counter: usize,
}

impl Hold {
    /// Hold window of `block_size * DEFAULT_HOLD_FACTOR` operations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit hold window, in operations.
    pub fn with_window(window: usize) -> Self {
        Self {
            window: Some(window),
            ..Self::default()
        }
    }

    /// Hold window set with [`with_window`](Self::with_window). `None` means
    /// `block_size * DEFAULT_HOLD_FACTOR` of the buffer the policy drives; see
    /// [`HoldBuffer::hold_window`](crate::HoldBuffer::hold_window).
    pub fn window(&self) -> Option<usize> {
        self.window
    }

    /// Hold window in operations for a buffer with blocks of `block_size`.
    pub fn hold_window_for(&self, block_size: usize) -> usize {
        self.window
            .unwrap_or(block_size.saturating_mul(DEFAULT_HOLD_FACTOR))
    }

    pub fn required_blocks(&self) -> usize {
        self.required_blocks
    }

    pub fn hold_value(&self) -> usize {
        self.hold_value
    }

    pub fn hold_counter(&self) -> usize {
        self.hold_counter
    }

    fn release_drained<T: Copy>(ring: &mut BlockRing<T>) {
        let before = ring.block_count();
        while ring.slack() >= 2 * ring.block_size() {
            if !ring.remove_before_read() {
                break;
            }
        }
        trace!(
            released = before - ring.block_count(),
            blocks = ring.block_count(),
            "hold window elapsed"
        );
    }
}

impl sealed::Sealed for Hold {}

impl<T: Copy> ResizePolicy<T> for Hold {
    fn name(&self) -> &'static str {
        "hold"
    }

    fn validate(&self, config: &BufferConfig) -> Result<(), ConfigError> {
        config.validate_at_least_one_block()
    }

    fn on_prepare(&mut self, ring: &mut BlockRing<T>) {
        NoShift::prepare(ring);
        self.required_blocks = 0;
        self.hold_value = 0;
        self.hold_counter = 0;
    }

    fn on_write(&mut self, ring: &mut BlockRing<T>) {
        NoShift::grow_if_due(ring);
    }

    // Removal is deferred to `on_settle`.
    fn on_read(&mut self, _ring: &mut BlockRing<T>) {}

    fn on_settle(&mut self, ring: &mut BlockRing<T>) {
        self.required_blocks = ring.data_size().div_ceil(ring.block_size()) + 1;

        if self.required_blocks >= self.hold_value {
            self.hold_counter = 0;
            self.hold_value = self.required_blocks;
            return;
        }

        if self.hold_counter < self.hold_window_for(ring.block_size()) {
            self.hold_counter += 1;
            return;
        }

        self.hold_counter = 0;
        self.hold_value = self.required_blocks;
        Self::release_drained(ring);
    }
}
