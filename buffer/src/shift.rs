//! Shifting resize policy.

use crate::policy::{ResizePolicy, sealed};
use crate::ring::BlockRing;

/// Grows only when every allocated slot is taken and shrinks as soon as one
/// whole block of slack exists, moving live data so the free region stays
/// contiguous.
///
/// Keeps slack below one block after every read. A buffer with no data holds
/// no blocks at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Shift;

impl sealed::Sealed for Shift {}

impl<T: Copy> ResizePolicy<T> for Shift {
    fn name(&self) -> &'static str {
        "shift"
    }

    fn on_write(&mut self, ring: &mut BlockRing<T>) {
        if ring.data_size() == ring.buffer_size() {
            ring.grow_shifting();
        }
    }

    fn on_read(&mut self, ring: &mut BlockRing<T>) {
        if ring.slack() == ring.block_size() {
            ring.shrink_shifting();
        }
    }
}
