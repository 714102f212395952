//! Error types for buffer operations.

use thiserror::Error;

/// Buffer operation error.
///
/// Both variants are recoverable: the caller retries later or drops the unit.
/// The type is `Copy` so the read/write path never allocates to report them.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// A write found the buffer holding `maximum` units already.
    #[error("buffer: capacity exhausted ({maximum} units)")]
    CapacityExhausted { maximum: usize },

    /// A read found no data.
    #[error("buffer: empty")]
    Empty,
}

/// Construction-time configuration error.
///
/// A buffer is never created from a configuration that fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("buffer: block size cannot be zero")]
    ZeroBlockSize,

    #[error("buffer: maximum buffer size cannot be zero")]
    ZeroMaximumBufferSize,

    #[error("buffer: maximum buffer size {maximum} is less than block size {block_size}")]
    MaximumBelowBlockSize { maximum: usize, block_size: usize },

    #[error("buffer: maximum buffer size {maximum} cannot be rounded up to blocks of {block_size}")]
    MaximumOverflow { maximum: usize, block_size: usize },

    #[error("buffer: unknown resize policy {0:?}")]
    UnknownPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_error_display() {
        let err = BufferError::CapacityExhausted { maximum: 64 };
        assert_eq!(format!("{}", err), "buffer: capacity exhausted (64 units)");
        assert_eq!(format!("{}", BufferError::Empty), "buffer: empty");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MaximumBelowBlockSize {
            maximum: 2,
            block_size: 4,
        };
        assert!(format!("{}", err).contains("less than block size 4"));

        let err = ConfigError::UnknownPolicy("lazy".into());
        assert_eq!(format!("{}", err), "buffer: unknown resize policy \"lazy\"");
    }

    #[test]
    fn test_buffer_error_is_copy() {
        fn assert_copy<T: Copy>() {}
        assert_copy::<BufferError>();
    }
}
