//! Rate-driven buffer controller.

use std::fmt;

use anyhow::Result;
use blockring_buffer::{DynBuffer, ResizePolicy};
use serde::Serialize;

/// Placeholder for simulated units; written values stay in `0..128`.
pub const PLACEHOLDER: i8 = -1;

/// Allocation rate that maps to 1.0 in normalized metrics, in units per second.
const ALLOCATION_SCALE: f64 = 1024.0 * 16.0;

/// Read rate that maps to 1.0 in normalized metrics, in units per second.
const READ_RATE_SCALE: f64 = 1024.0;

/// Controller run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Started,
    Paused,
    #[default]
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Started => "started",
            ControllerState::Paused => "paused",
            ControllerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Unit counters accumulated over a controller's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Units written successfully.
    pub accepted: u64,
    /// Writes refused because the buffer was at its maximum.
    pub dropped: u64,
    /// Units read successfully.
    pub read: u64,
    /// Reads that found the buffer empty.
    pub missed: u64,
}

/// Values scaled to roughly `[0, 1]` for plotting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normalized {
    pub buffer: f64,
    pub allocation: f64,
    pub read_rate: f64,
}

/// Snapshot published after every tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub tick: u64,
    pub label: String,
    pub state: ControllerState,
    pub write_rate: f64,
    pub read_rate: f64,
    pub data_size: usize,
    pub buffer_size: usize,
    pub block_count: usize,
    pub allocation_rate: f64,
    pub normalized: Normalized,
}

/// Drives one buffer with a write rate and a read rate.
///
/// Each [`tick`](Controller::tick) stands for one refresh interval: it writes
/// `write_rate * interval` units, then reads `read_rate * interval` units, and
/// after each batch recomputes the allocation rate from the change in buffer
/// size.
pub struct Controller {
    label: String,
    buffer: DynBuffer<i8>,
    refresh_interval: f64,
    write_rate: f64,
    read_rate: f64,
    last_buffer_size: usize,
    allocation_rate: f64,
    state: ControllerState,
    ticks: u64,
    counters: Counters,
    peak_buffer_size: usize,
    peak_data_size: usize,
}

impl Controller {
    /// Creates a stopped controller with zero rates.
    pub fn new(
        label: impl Into<String>,
        refresh_interval: f64,
        buffer: DynBuffer<i8>,
    ) -> Result<Self> {
        if !(refresh_interval > 0.0 && refresh_interval <= 1.0) {
            anyhow::bail!(
                "refresh interval should be greater than 0 but not greater than 1, got {}",
                refresh_interval
            );
        }
        let last_buffer_size = buffer.buffer_size();
        Ok(Self {
            label: label.into(),
            peak_buffer_size: last_buffer_size,
            buffer,
            refresh_interval,
            write_rate: 0.0,
            read_rate: 0.0,
            last_buffer_size,
            allocation_rate: 0.0,
            state: ControllerState::Stopped,
            ticks: 0,
            counters: Counters::default(),
            peak_data_size: 0,
        })
    }

    pub fn start(&mut self) {
        self.state = ControllerState::Started;
    }

    pub fn stop(&mut self) {
        self.state = ControllerState::Stopped;
    }

    pub fn pause(&mut self) {
        self.state = ControllerState::Paused;
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn write_rate(&self) -> f64 {
        self.write_rate
    }

    /// Sets the write rate in units per second. Negative values become 0.
    pub fn set_write_rate(&mut self, rate: f64) {
        self.write_rate = rate.max(0.0);
    }

    pub fn read_rate(&self) -> f64 {
        self.read_rate
    }

    /// Sets the read rate in units per second. Negative values become 0.
    pub fn set_read_rate(&mut self, rate: f64) {
        self.read_rate = rate.max(0.0);
    }

    /// Buffer size change per second over the last batch.
    pub fn allocation_rate(&self) -> f64 {
        self.allocation_rate
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn peak_buffer_size(&self) -> usize {
        self.peak_buffer_size
    }

    pub fn peak_data_size(&self) -> usize {
        self.peak_data_size
    }

    /// Number of ticks elapsed, including ticks while not started.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn buffer(&self) -> &DynBuffer<i8> {
        &self.buffer
    }

    /// Advances one refresh interval. Only a started controller touches its
    /// buffer; returns whether it did.
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        if self.state != ControllerState::Started {
            return false;
        }

        self.write_batch();
        self.update_allocation_rate();
        self.peak_buffer_size = self.peak_buffer_size.max(self.buffer.buffer_size());
        self.peak_data_size = self.peak_data_size.max(self.buffer.data_size());

        self.read_batch();
        self.update_allocation_rate();
        true
    }

    fn write_batch(&mut self) {
        let units = units_per_tick(self.write_rate, self.refresh_interval);
        for i in 0..units {
            match self.buffer.write((i % 128) as i8) {
                Ok(()) => self.counters.accepted += 1,
                Err(_) => self.counters.dropped += 1,
            }
        }
    }

    fn read_batch(&mut self) {
        let units = units_per_tick(self.read_rate, self.refresh_interval);
        for _ in 0..units {
            match self.buffer.read() {
                Ok(_) => self.counters.read += 1,
                Err(_) => self.counters.missed += 1,
            }
        }
    }

    fn update_allocation_rate(&mut self) {
        let size = self.buffer.buffer_size();
        let diff = size.abs_diff(self.last_buffer_size);
        self.last_buffer_size = size;
        self.allocation_rate = diff as f64 / self.refresh_interval;
    }

    pub fn metrics(&self) -> Metrics {
        let stats = self.buffer.stats();
        Metrics {
            tick: self.ticks,
            label: self.label.clone(),
            state: self.state,
            write_rate: self.write_rate,
            read_rate: self.read_rate,
            data_size: stats.data_size,
            buffer_size: stats.buffer_size,
            block_count: stats.block_count,
            allocation_rate: self.allocation_rate,
            normalized: Normalized {
                buffer: stats.buffer_size as f64 / stats.maximum_buffer_size as f64,
                allocation: self.allocation_rate / ALLOCATION_SCALE,
                read_rate: self.read_rate / READ_RATE_SCALE,
            },
        }
    }

    /// Name of the buffer's resize policy.
    pub fn policy_name(&self) -> &'static str {
        self.buffer.policy().name()
    }
}

/// Units moved per tick at `rate` units per second, rounded half to even.
pub fn units_per_tick(rate: f64, refresh_interval: f64) -> usize {
    (rate * refresh_interval).round_ties_even() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockring_buffer::{BufferConfig, PolicyKind};

    fn controller(kind: PolicyKind, interval: f64, block_size: usize, max: usize) -> Controller {
        let buffer =
            DynBuffer::from_kind(BufferConfig::new(block_size, max), PLACEHOLDER, kind, None)
                .unwrap();
        Controller::new(kind.as_str(), interval, buffer).unwrap()
    }

    #[test]
    fn test_rejects_bad_interval() {
        for interval in [0.0, -1.0, 1.01] {
            let buffer =
                DynBuffer::from_kind(BufferConfig::default(), PLACEHOLDER, PolicyKind::Shift, None)
                    .unwrap();
            assert!(Controller::new("x", interval, buffer).is_err());
        }
    }

    #[test]
    fn test_units_per_tick() {
        assert_eq!(units_per_tick(400.0, 0.01), 4);
        assert_eq!(units_per_tick(5.0, 0.5), 2);
        assert_eq!(units_per_tick(7.0, 0.5), 4);
        assert_eq!(units_per_tick(0.0, 1.0), 0);
    }

    #[test]
    fn test_stopped_controller_does_nothing() {
        let mut c = controller(PolicyKind::Shift, 0.5, 4, 16);
        c.set_write_rate(8.0);
        assert!(!c.tick());
        c.pause();
        assert!(!c.tick());
        assert_eq!(c.buffer().data_size(), 0);
        assert_eq!(c.ticks(), 2);
        assert_eq!(c.state(), ControllerState::Paused);
    }

    #[test]
    fn test_tick_writes_then_reads() {
        let mut c = controller(PolicyKind::Shift, 0.5, 4, 16);
        c.set_write_rate(12.0);
        c.set_read_rate(4.0);
        c.start();
        assert!(c.tick());
        assert_eq!(c.buffer().data_size(), 4);
        assert_eq!(c.buffer().to_vec(), vec![2, 3, 4, 5]);
        assert_eq!(
            c.counters(),
            Counters {
                accepted: 6,
                dropped: 0,
                read: 2,
                missed: 0
            }
        );
        assert_eq!(c.peak_data_size(), 6);
        assert_eq!(c.peak_buffer_size(), 8);
    }

    #[test]
    fn test_allocation_rate_tracks_last_batch() {
        let mut c = controller(PolicyKind::Shift, 0.5, 4, 16);
        c.set_write_rate(8.0);
        c.set_read_rate(8.0);
        c.start();
        c.tick();
        // Grew one block while writing, released it again while reading.
        assert_eq!(c.buffer().buffer_size(), 0);
        assert_eq!(c.allocation_rate(), 8.0);

        c.set_write_rate(0.0);
        c.set_read_rate(0.0);
        c.tick();
        assert_eq!(c.allocation_rate(), 0.0);
    }

    #[test]
    fn test_counts_dropped_and_missed() {
        let mut c = controller(PolicyKind::NoShift, 0.5, 4, 16);
        c.set_write_rate(40.0);
        c.start();
        c.tick();
        assert_eq!(c.counters().accepted, 16);
        assert_eq!(c.counters().dropped, 4);

        c.set_write_rate(0.0);
        c.set_read_rate(40.0);
        c.tick();
        assert_eq!(c.counters().read, 16);
        assert_eq!(c.counters().missed, 4);
        assert_eq!(c.buffer().buffer_size(), 4);
    }

    #[test]
    fn test_negative_rates_clamp() {
        let mut c = controller(PolicyKind::Hold, 0.01, 32, 1024);
        c.set_write_rate(-10.0);
        c.set_read_rate(-1.0);
        assert_eq!(c.write_rate(), 0.0);
        assert_eq!(c.read_rate(), 0.0);
    }

    #[test]
    fn test_metrics() {
        let mut c = controller(PolicyKind::Hold, 0.01, 32, 1024);
        c.set_write_rate(6400.0);
        c.set_read_rate(512.0);
        c.start();
        c.tick();
        let m = c.metrics();
        assert_eq!(m.tick, 1);
        assert_eq!(m.label, "hold");
        assert_eq!(m.state, ControllerState::Started);
        assert_eq!(m.data_size, 64 - 5);
        // Pre-allocated block plus two added at 0 and 32 units.
        assert_eq!(m.block_count, 3);
        assert_eq!(m.normalized.buffer, 96.0 / 1024.0);
        assert_eq!(m.normalized.read_rate, 0.5);

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["state"], "started");
        assert_eq!(c.policy_name(), "hold");
    }
}
