//! Process IO throughput from /proc/self/io

use anyhow::{Context, Result};
use std::fs;
use std::time::Instant;

/// Read/write throughput in MB/s, derived between consecutive samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IoRates {
    pub read_mbps: f32,
    pub write_mbps: f32,
}

/// Stateful /proc/self/io probe. The first sample always reports zero
/// rates.
#[derive(Debug, Default)]
pub struct IoSource {
    prev: Option<IoSample>,
}

#[derive(Debug, Clone, Copy)]
struct IoSample {
    at: Instant,
    read_bytes: u64,
    write_bytes: u64,
}

impl IoSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample this process's storage throughput.
    ///
    /// # Errors
    /// Fails if /proc/self/io is unreadable or missing either counter.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(&mut self) -> Result<IoRates> {
        let content =
            fs::read_to_string("/proc/self/io").context("Failed to read /proc/self/io")?;
        let (read_bytes, write_bytes) = parse_io_counters(&content)?;
        let now = Instant::now();

        let rates = match self.prev {
            Some(prev) => {
                let secs = now.duration_since(prev.at).as_secs_f32();
                if secs > 0.0 {
                    IoRates {
                        read_mbps: read_bytes.saturating_sub(prev.read_bytes) as f32
                            / 1_000_000.0
                            / secs,
                        write_mbps: write_bytes.saturating_sub(prev.write_bytes) as f32
                            / 1_000_000.0
                            / secs,
                    }
                } else {
                    IoRates::default()
                }
            }
            None => IoRates::default(),
        };
        self.prev = Some(IoSample { at: now, read_bytes, write_bytes });
        Ok(rates)
    }
}

fn parse_io_counters(content: &str) -> Result<(u64, u64)> {
    let mut read_bytes = None;
    let mut write_bytes = None;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("read_bytes:") {
            read_bytes = Some(rest.trim().parse().context("Malformed read_bytes line")?);
        } else if let Some(rest) = line.strip_prefix("write_bytes:") {
            write_bytes = Some(rest.trim().parse().context("Malformed write_bytes line")?);
        }
    }
    Ok((
        read_bytes.context("No read_bytes in /proc/self/io")?,
        write_bytes.context("No write_bytes in /proc/self/io")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IO: &str = "rchar: 4292\n\
                      wchar: 1024\n\
                      read_bytes: 8192000\n\
                      write_bytes: 4096000\n\
                      cancelled_write_bytes: 0\n";

    #[test]
    fn test_parse_io_counters() {
        let (read, write) = parse_io_counters(IO).unwrap();
        assert_eq!(read, 8_192_000);
        assert_eq!(write, 4_096_000);
    }

    #[test]
    fn test_parse_requires_both_counters() {
        assert!(parse_io_counters("rchar: 42\n").is_err());
        assert!(parse_io_counters("read_bytes: 42\n").is_err());
    }

    #[test]
    fn test_first_sample_reports_zero_rates() {
        // This test relies on /proc being available (Linux only)
        #[cfg(target_os = "linux")]
        {
            let mut source = IoSource::new();
            assert_eq!(source.sample().unwrap(), IoRates::default());
        }
    }
}
