//! Simulation configuration loading.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use blockring_buffer::{
    BufferConfig, DEFAULT_BLOCK_SIZE, DEFAULT_MAXIMUM_BUFFER_SIZE, PolicyKind, ResizePolicy,
};
use serde::{Deserialize, Serialize};

use crate::controller::units_per_tick;

/// Tick period used when none is configured, in seconds.
pub const DEFAULT_REFRESH_INTERVAL: f64 = 0.01;

/// Tick count of the phase built from command line rates.
pub const DEFAULT_TICKS: u64 = 1000;

/// Upper bound on the units a phase may write or read in one tick.
pub const MAX_UNITS_PER_TICK: usize = 1 << 20;

/// Configuration file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Seconds per tick, in (0, 1].
    pub refresh_interval: f64,
    pub block_size: usize,
    pub maximum_buffer_size: usize,
    /// Hold window for `hold` buffers; `None` keeps the policy default.
    pub hold_window: Option<usize>,
    /// Sleep for the refresh interval between ticks.
    pub realtime: bool,
    pub buffers: Vec<BufferEntry>,
    pub phases: Vec<Phase>,
}

/// One simulated buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferEntry {
    pub label: String,
    pub policy: PolicyKind,
}

/// A span of ticks with fixed rates, in units per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub ticks: u64,
    #[serde(default)]
    pub write_rate: f64,
    #[serde(default)]
    pub read_rate: f64,
    #[serde(default)]
    pub paused: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            block_size: DEFAULT_BLOCK_SIZE,
            maximum_buffer_size: DEFAULT_MAXIMUM_BUFFER_SIZE,
            hold_window: None,
            realtime: false,
            buffers: vec![
                BufferEntry::new(PolicyKind::Shift),
                BufferEntry::new(PolicyKind::Hold),
            ],
            phases: Vec::new(),
        }
    }
}

impl BufferEntry {
    /// Entry labeled after its policy.
    pub fn new(policy: PolicyKind) -> Self {
        Self {
            label: policy.to_string(),
            policy,
        }
    }
}

impl Phase {
    pub fn running(ticks: u64, write_rate: f64, read_rate: f64) -> Self {
        Self {
            ticks,
            write_rate,
            read_rate,
            paused: false,
        }
    }
}

impl AnalyzerConfig {
    /// Loads a configuration file, YAML or JSON by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let data = std::fs::read(path).with_context(|| format!("read config {}", path.display()))?;
        Self::parse(&data, ext).with_context(|| format!("parse config {}", path.display()))
    }

    /// Parses configuration data in the format named by `ext`.
    pub fn parse(data: &[u8], ext: &str) -> Result<Self> {
        let cfg = match ext {
            "json" => serde_json::from_slice(data)?,
            "yaml" | "yml" => serde_yaml::from_slice(data)?,
            _ => anyhow::bail!("unsupported config format: {:?}", ext),
        };
        Ok(cfg)
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig::new(self.block_size, self.maximum_buffer_size)
    }

    /// Total number of ticks across all phases.
    pub fn total_ticks(&self) -> u64 {
        self.phases.iter().map(|p| p.ticks).sum()
    }

    /// Checks the configuration before any buffer is built.
    pub fn validate(&self) -> Result<()> {
        if !(self.refresh_interval > 0.0 && self.refresh_interval <= 1.0) {
            anyhow::bail!(
                "refresh_interval must be in (0, 1] seconds, got {}",
                self.refresh_interval
            );
        }
        if self.buffers.is_empty() {
            anyhow::bail!("at least one buffer is required");
        }
        if self.phases.is_empty() {
            anyhow::bail!("at least one phase is required");
        }

        let buffer_config = self.buffer_config();
        let mut labels = HashSet::new();
        for entry in &self.buffers {
            if entry.label.is_empty() {
                anyhow::bail!("buffer entry missing label");
            }
            if !labels.insert(entry.label.as_str()) {
                anyhow::bail!("duplicate buffer label: {}", entry.label);
            }
            entry
                .policy
                .into_policy::<i8>(self.hold_window)
                .validate(&buffer_config)
                .with_context(|| format!("buffer {}", entry.label))?;
        }

        for (i, phase) in self.phases.iter().enumerate() {
            if !phase.write_rate.is_finite() || !phase.read_rate.is_finite() {
                anyhow::bail!("phase {}: rates must be finite", i);
            }
            for rate in [phase.write_rate, phase.read_rate] {
                if units_per_tick(rate, self.refresh_interval) > MAX_UNITS_PER_TICK {
                    anyhow::bail!(
                        "phase {}: rate {} exceeds {} units per tick",
                        i,
                        rate,
                        MAX_UNITS_PER_TICK
                    );
                }
            }
        }

        Ok(())
    }
}
