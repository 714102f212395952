//! Phase runner driving all controllers in lockstep.

use std::time::Duration;

use anyhow::Result;
use blockring_buffer::DynBuffer;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{AnalyzerConfig, Phase};
use crate::controller::{Controller, Counters, Metrics, PLACEHOLDER};

/// Final report of one simulated buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferSummary {
    pub label: String,
    pub policy: String,
    pub peak_buffer_size: usize,
    pub peak_data_size: usize,
    pub final_buffer_size: usize,
    pub final_data_size: usize,
    pub blocks_allocated: u64,
    pub blocks_released: u64,
    #[serde(flatten)]
    pub counters: Counters,
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub refresh_interval: f64,
    pub block_size: usize,
    pub maximum_buffer_size: usize,
    pub buffers: Vec<BufferSummary>,
}

/// Runs the configured phases over one controller per buffer entry.
pub struct Runner {
    controllers: Vec<Controller>,
    phases: Vec<Phase>,
    refresh_interval: f64,
    realtime: bool,
    block_size: usize,
    maximum_buffer_size: usize,
}

impl Runner {
    /// Validates `config` and builds the controllers.
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let buffer_config = config.buffer_config();
        let mut controllers = Vec::with_capacity(config.buffers.len());
        for entry in &config.buffers {
            let buffer =
                DynBuffer::from_kind(buffer_config, PLACEHOLDER, entry.policy, config.hold_window)?;
            controllers.push(Controller::new(
                entry.label.clone(),
                config.refresh_interval,
                buffer,
            )?);
        }

        Ok(Self {
            controllers,
            phases: config.phases.clone(),
            refresh_interval: config.refresh_interval,
            realtime: config.realtime,
            block_size: config.block_size,
            maximum_buffer_size: buffer_config.rounded_maximum(),
        })
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    /// Runs every phase, sending each controller's [`Metrics`] on `tx` after
    /// every tick.
    ///
    /// A closed receiver stops metric publishing but not the simulation.
    pub async fn run(mut self, tx: mpsc::Sender<Metrics>) -> Result<Summary> {
        let mut ticker = if self.realtime {
            let mut ticker = time::interval(Duration::from_secs_f64(self.refresh_interval));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        } else {
            None
        };

        for c in &mut self.controllers {
            c.start();
        }

        let mut publishing = true;
        let mut ticks = 0u64;
        for (i, phase) in self.phases.iter().enumerate() {
            info!(
                phase = i,
                ticks = phase.ticks,
                write_rate = phase.write_rate,
                read_rate = phase.read_rate,
                paused = phase.paused,
                "phase started"
            );
            for c in &mut self.controllers {
                c.set_write_rate(phase.write_rate);
                c.set_read_rate(phase.read_rate);
                if phase.paused {
                    c.pause();
                } else {
                    c.start();
                }
            }

            for _ in 0..phase.ticks {
                if let Some(ticker) = ticker.as_mut() {
                    ticker.tick().await;
                }
                ticks += 1;
                for c in &mut self.controllers {
                    c.tick();
                    if publishing && tx.send(c.metrics()).await.is_err() {
                        warn!("metrics receiver closed");
                        publishing = false;
                    }
                }
            }

            for c in &self.controllers {
                debug!(
                    label = c.label(),
                    state = %c.state(),
                    ticks = c.ticks(),
                    write_rate = c.write_rate(),
                    read_rate = c.read_rate(),
                    data_size = c.buffer().data_size(),
                    buffer_size = c.buffer().buffer_size(),
                    allocation_rate = c.allocation_rate(),
                    "phase finished"
                );
            }
        }

        for c in &mut self.controllers {
            c.stop();
        }

        let buffers = self.controllers.iter().map(summarize).collect();
        Ok(Summary {
            ticks,
            refresh_interval: self.refresh_interval,
            block_size: self.block_size,
            maximum_buffer_size: self.maximum_buffer_size,
            buffers,
        })
    }
}

fn summarize(c: &Controller) -> BufferSummary {
    let stats = c.buffer().stats();
    BufferSummary {
        label: c.label().to_string(),
        policy: c.policy_name().to_string(),
        peak_buffer_size: c.peak_buffer_size(),
        peak_data_size: c.peak_data_size(),
        final_buffer_size: stats.buffer_size,
        final_data_size: stats.data_size,
        blocks_allocated: stats.blocks_allocated,
        blocks_released: stats.blocks_released,
        counters: c.counters(),
    }
}
