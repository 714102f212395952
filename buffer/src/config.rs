//! Buffer sizing configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default block size used when none is configured.
pub const DEFAULT_BLOCK_SIZE: usize = 32;

/// Default maximum buffer size used when none is configured.
pub const DEFAULT_MAXIMUM_BUFFER_SIZE: usize = 1024;

/// Sizing parameters shared by every buffer variant.
///
/// `maximum_buffer_size` is the requested ceiling; the buffer rounds it up to
/// the smallest multiple of `block_size` that can hold it (see
/// [`BufferConfig::rounded_maximum`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    pub block_size: usize,
    pub maximum_buffer_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            maximum_buffer_size: DEFAULT_MAXIMUM_BUFFER_SIZE,
        }
    }
}

impl BufferConfig {
    /// Creates a configuration from a block size and a requested maximum.
    pub fn new(block_size: usize, maximum_buffer_size: usize) -> Self {
        Self {
            block_size,
            maximum_buffer_size,
        }
    }

    /// Checks the parameters every variant requires.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.maximum_buffer_size == 0 {
            return Err(ConfigError::ZeroMaximumBufferSize);
        }
        self.checked_rounded_maximum()?;
        Ok(())
    }

    /// Like [`validate`](Self::validate), and additionally rejects a requested
    /// maximum smaller than one block.
    pub fn validate_at_least_one_block(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.maximum_buffer_size < self.block_size {
            return Err(ConfigError::MaximumBelowBlockSize {
                maximum: self.maximum_buffer_size,
                block_size: self.block_size,
            });
        }
        self.checked_rounded_maximum()?;
        Ok(())
    }

    /// Maximum rounded up to a whole number of blocks.
    ///
    /// Only meaningful for a configuration that passed validation.
    pub fn rounded_maximum(&self) -> usize {
        self.maximum_blocks() * self.block_size
    }

    fn checked_rounded_maximum(&self) -> Result<usize, ConfigError> {
        self.maximum_blocks()
            .checked_mul(self.block_size)
            .ok_or(ConfigError::MaximumOverflow {
                maximum: self.maximum_buffer_size,
                block_size: self.block_size,
            })
    }

    /// Number of blocks the rounded maximum holds.
    pub fn maximum_blocks(&self) -> usize {
        self.maximum_buffer_size.div_ceil(self.block_size)
    }
}
