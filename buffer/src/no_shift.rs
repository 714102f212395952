//! Non-shifting resize policy.

use crate::config::BufferConfig;
use crate::error::ConfigError;
use crate::policy::{ResizePolicy, sealed};
use crate::ring::BlockRing;

/// Adds a block right after the write block and removes the block right
/// before the read block, timed so that live data never has to move.
///
/// A block is added when exactly one block of slack is left (and the maximum
/// is not reached), and removed when two blocks of slack exist. The buffer
/// therefore keeps up to one fully empty reserve block, and always at least
/// one resident block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoShift;

impl NoShift {
    pub(crate) fn prepare<T: Copy>(ring: &mut BlockRing<T>) {
        if ring.block_count() == 0 {
            ring.grow_after_write();
        }
    }

    pub(crate) fn grow_if_due<T: Copy>(ring: &mut BlockRing<T>) {
        if ring.buffer_size() < ring.maximum_buffer_size() && ring.slack() == ring.block_size() {
            ring.grow_after_write();
        }
    }
}

impl sealed::Sealed for NoShift {}

impl<T: Copy> ResizePolicy<T> for NoShift {
    fn name(&self) -> &'static str {
        "no_shift"
    }

    fn validate(&self, config: &BufferConfig) -> Result<(), ConfigError> {
        config.validate_at_least_one_block()
    }

    fn on_prepare(&mut self, ring: &mut BlockRing<T>) {
        Self::prepare(ring);
    }

    fn on_write(&mut self, ring: &mut BlockRing<T>) {
        Self::grow_if_due(ring);
    }

    fn on_read(&mut self, ring: &mut BlockRing<T>) {
        if ring.slack() == 2 * ring.block_size() {
            ring.remove_before_read();
        }
    }
}
