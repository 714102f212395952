//! Resize policies deciding when a buffer gains or loses blocks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::BufferConfig;
use crate::error::ConfigError;
use crate::hold::Hold;
use crate::no_shift::NoShift;
use crate::ring::BlockRing;
use crate::shift::Shift;

/// Strategy hooks a [`CircularBuffer`](crate::CircularBuffer) calls around
/// every operation.
///
/// - `on_prepare`: once at construction and again on reset, with an empty ring.
/// - `on_write`: before a write that is known to succeed; may grow the ring.
/// - `on_read`: after a successful read; may shrink the ring.
/// - `on_settle`: after every write or read call, successful or not.
///
/// The trait is sealed. Only [`Shift`], [`NoShift`] and [`Hold`] may change
/// the structure of a ring:
///
/// ```compile_fail
/// use blockring_buffer::{BlockRing, ResizePolicy};
///
/// struct Eager;
///
/// impl ResizePolicy<i32> for Eager {
///     fn name(&self) -> &'static str {
///         "eager"
///     }
///
///     fn on_write(&mut self, _ring: &mut BlockRing<i32>) {}
///
///     fn on_read(&mut self, _ring: &mut BlockRing<i32>) {}
/// }
/// ```
pub trait ResizePolicy<T>: sealed::Sealed {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Rejects configurations this policy cannot run with.
    fn validate(&self, config: &BufferConfig) -> Result<(), ConfigError> {
        config.validate()
    }

    fn on_prepare(&mut self, _ring: &mut BlockRing<T>) {}

    fn on_write(&mut self, ring: &mut BlockRing<T>);

    fn on_read(&mut self, ring: &mut BlockRing<T>);

    fn on_settle(&mut self, _ring: &mut BlockRing<T>) {}
}

pub(crate) mod sealed {
    pub trait Sealed {}

    impl<P: Sealed + ?Sized> Sealed for Box<P> {}
}

impl<T, P: ResizePolicy<T> + ?Sized> ResizePolicy<T> for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn validate(&self, config: &BufferConfig) -> Result<(), ConfigError> {
        (**self).validate(config)
    }

    fn on_prepare(&mut self, ring: &mut BlockRing<T>) {
        (**self).on_prepare(ring)
    }

    fn on_write(&mut self, ring: &mut BlockRing<T>) {
        (**self).on_write(ring)
    }

    fn on_read(&mut self, ring: &mut BlockRing<T>) {
        (**self).on_read(ring)
    }

    fn on_settle(&mut self, ring: &mut BlockRing<T>) {
        (**self).on_settle(ring)
    }
}

/// Policy selector for buffers chosen at runtime, e.g. from a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Shift,
    NoShift,
    Hold,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [PolicyKind::Shift, PolicyKind::NoShift, PolicyKind::Hold];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Shift => "shift",
            PolicyKind::NoShift => "no_shift",
            PolicyKind::Hold => "hold",
        }
    }

    /// Builds the policy. `hold_window` only applies to [`PolicyKind::Hold`];
    /// `None` keeps its default window.
    pub fn into_policy<T: Copy>(
        self,
        hold_window: Option<usize>,
    ) -> Box<dyn ResizePolicy<T> + Send> {
        match self {
            PolicyKind::Shift => Box::new(Shift),
            PolicyKind::NoShift => Box::new(NoShift),
            PolicyKind::Hold => match hold_window {
                Some(window) => Box::new(Hold::with_window(window)),
                None => Box::new(Hold::new()),
            },
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shift" => Ok(PolicyKind::Shift),
            "no_shift" | "no-shift" | "noshift" => Ok(PolicyKind::NoShift),
            "hold" => Ok(PolicyKind::Hold),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}
