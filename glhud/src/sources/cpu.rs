//! Aggregate CPU load from /proc/stat

use anyhow::{Context, Result};
use std::fs;

/// Stateful /proc/stat probe
///
/// Utilization is the busy/total delta between consecutive samples, so the
/// first sample always reports 0.
#[derive(Debug, Default)]
pub struct CpuSource {
    prev: Option<CpuTimes>,
}

#[derive(Debug, Clone, Copy)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

impl CpuSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample aggregate CPU utilization as a 0..=100 percentage.
    ///
    /// # Errors
    /// Fails if /proc/stat is unreadable or the aggregate line is
    /// malformed.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(&mut self) -> Result<f32> {
        let content = fs::read_to_string("/proc/stat").context("Failed to read /proc/stat")?;
        let times = parse_aggregate_line(&content)?;
        let percent = match self.prev {
            Some(prev) => {
                let total = times.total.saturating_sub(prev.total);
                let busy = times.busy.saturating_sub(prev.busy);
                if total == 0 {
                    0.0
                } else {
                    busy as f32 * 100.0 / total as f32
                }
            }
            None => 0.0,
        };
        self.prev = Some(times);
        Ok(percent)
    }
}

/// Parse the aggregate "cpu " line:
/// user nice system idle iowait irq softirq steal [guest guest_nice]
fn parse_aggregate_line(stat: &str) -> Result<CpuTimes> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .context("No aggregate cpu line in /proc/stat")?;

    let mut fields = line.split_whitespace().skip(1);
    let mut values = [0u64; 8];
    for value in &mut values {
        *value = fields
            .next()
            .context("Truncated cpu line in /proc/stat")?
            .parse()
            .context("Non-numeric field in /proc/stat cpu line")?;
    }

    let [user, nice, system, idle, iowait, irq, softirq, steal] = values;
    let busy = user + nice + system + irq + softirq + steal;
    Ok(CpuTimes { busy, total: busy + idle + iowait })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  100 0 50 800 50 0 0 0 0 0\n\
                        cpu0 25 0 12 200 12 0 0 0 0 0\n\
                        intr 12345\n";

    #[test]
    fn test_parse_aggregate_line() {
        let times = parse_aggregate_line(STAT).unwrap();
        assert_eq!(times.busy, 150);
        assert_eq!(times.total, 1000);
    }

    #[test]
    fn test_parse_rejects_truncated_line() {
        assert!(parse_aggregate_line("cpu  100 0 50\n").is_err());
        assert!(parse_aggregate_line("intr 12345\n").is_err());
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_first_sample_reports_zero() {
        // This test relies on /proc being available (Linux only)
        #[cfg(target_os = "linux")]
        {
            let mut source = CpuSource::new();
            assert_eq!(source.sample().unwrap(), 0.0);
            let second = source.sample().unwrap();
            assert!((0.0..=100.0).contains(&second));
        }
    }
}
