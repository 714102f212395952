//! Metric rows and summary output.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::controller::Metrics;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// YAML summary, text table rows (default).
    #[default]
    Yaml,
    /// JSON summary, JSON lines rows.
    Json,
}

/// Summary output destination.
pub struct Output {
    pub format: OutputFormat,
    pub file: Option<PathBuf>,
}

impl Output {
    pub fn new(format: OutputFormat, file: Option<PathBuf>) -> Self {
        Self { format, file }
    }

    /// Serializes `value` to the output file, or stdout without one.
    pub fn write<T: Serialize>(&self, value: &T) -> Result<()> {
        let output = self.render(value)?;

        match &self.file {
            Some(path) => {
                let mut file = File::create(path)?;
                file.write_all(output.as_bytes())?;
            }
            None => {
                println!("{}", output);
            }
        }

        Ok(())
    }

    fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        let output = match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
        };
        Ok(output)
    }
}

/// Writes one metric row per controller per printed tick.
pub struct MetricPrinter<W> {
    writer: W,
    format: OutputFormat,
    every: u64,
    header_written: bool,
}

impl<W: Write> MetricPrinter<W> {
    /// Prints ticks that are multiples of `every`; 0 is treated as 1.
    pub fn new(writer: W, format: OutputFormat, every: u64) -> Self {
        Self {
            writer,
            format,
            every: every.max(1),
            header_written: false,
        }
    }

    pub fn print(&mut self, m: &Metrics) -> Result<()> {
        if m.tick % self.every != 0 {
            return Ok(());
        }
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.writer, m)?;
                writeln!(self.writer)?;
            }
            OutputFormat::Yaml => {
                if !self.header_written {
                    writeln!(self.writer, "{}", header())?;
                    self.header_written = true;
                }
                writeln!(self.writer, "{}", row(m))?;
            }
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn header() -> String {
    format!(
        "{:>8}  {:<12} {:<8} {:>10} {:>10} {:>8} {:>8} {:>7} {:>12}",
        "tick", "buffer", "state", "write/s", "read/s", "data", "size", "blocks", "alloc/s"
    )
}

fn row(m: &Metrics) -> String {
    format!(
        "{:>8}  {:<12} {:<8} {:>10.1} {:>10.1} {:>8} {:>8} {:>7} {:>12.1}",
        m.tick,
        m.label,
        m.state.to_string(),
        m.write_rate,
        m.read_rate,
        m.data_size,
        m.buffer_size,
        m.block_count,
        m.allocation_rate
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerState, Normalized};

    fn metrics(tick: u64) -> Metrics {
        Metrics {
            tick,
            label: "hold".into(),
            state: ControllerState::Started,
            write_rate: 4000.0,
            read_rate: 1000.0,
            data_size: 30,
            buffer_size: 64,
            block_count: 2,
            allocation_rate: 3200.0,
            normalized: Normalized {
                buffer: 0.0625,
                allocation: 3200.0 / 16384.0,
                read_rate: 1000.0 / 1024.0,
            },
        }
    }

    #[test]
    fn test_table_rows() {
        let mut printer = MetricPrinter::new(Vec::new(), OutputFormat::Yaml, 2);
        for tick in 1..=4 {
            printer.print(&metrics(tick)).unwrap();
        }
        let out = String::from_utf8(printer.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("alloc/s"));
        assert!(lines[1].trim_start().starts_with("2  hold"));
        assert!(lines[1].contains("started"));
        assert!(lines[2].contains("3200.0"));
    }

    #[test]
    fn test_json_lines() {
        let mut printer = MetricPrinter::new(Vec::new(), OutputFormat::Json, 0);
        printer.print(&metrics(1)).unwrap();
        printer.print(&metrics(2)).unwrap();
        let out = String::from_utf8(printer.into_inner()).unwrap();
        let rows: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["tick"], 2);
        assert_eq!(rows[0]["normalized"]["buffer"], 0.0625);
    }

    #[test]
    fn test_render_formats() {
        let output = Output::new(OutputFormat::Json, None);
        let s = output.render(&metrics(7)).unwrap();
        assert!(s.contains("\"label\": \"hold\""));

        let output = Output::new(OutputFormat::Yaml, None);
        let s = output.render(&metrics(7)).unwrap();
        assert!(s.contains("label: hold"));
    }
}
