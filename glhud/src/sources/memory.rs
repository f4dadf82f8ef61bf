//! System memory from /proc/meminfo

use anyhow::{Context, Result};
use std::fs;

/// Total and available system memory in KiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kib: u64,
    pub avail_kib: u64,
}

impl MemInfo {
    #[must_use]
    pub fn used_kib(self) -> u64 {
        self.total_kib.saturating_sub(self.avail_kib)
    }
}

/// Read MemTotal and MemAvailable.
///
/// # Errors
/// Fails if /proc/meminfo is unreadable or either field is missing.
pub fn sample() -> Result<MemInfo> {
    let content = fs::read_to_string("/proc/meminfo").context("Failed to read /proc/meminfo")?;
    parse_meminfo(&content)
}

fn parse_meminfo(content: &str) -> Result<MemInfo> {
    let mut total = None;
    let mut avail = None;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = Some(parse_kib(rest).context("Malformed MemTotal line")?);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            avail = Some(parse_kib(rest).context("Malformed MemAvailable line")?);
        }
        if total.is_some() && avail.is_some() {
            break;
        }
    }
    Ok(MemInfo {
        total_kib: total.context("No MemTotal in /proc/meminfo")?,
        avail_kib: avail.context("No MemAvailable in /proc/meminfo")?,
    })
}

fn parse_kib(rest: &str) -> Result<u64> {
    let digits = rest.trim().trim_end_matches("kB").trim();
    Ok(digits.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16323412 kB\n\
                           MemFree:         1317232 kB\n\
                           MemAvailable:    9671248 kB\n\
                           Buffers:          523412 kB\n";

    #[test]
    fn test_parse_meminfo() {
        let info = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(info.total_kib, 16_323_412);
        assert_eq!(info.avail_kib, 9_671_248);
        assert_eq!(info.used_kib(), 6_652_164);
    }

    #[test]
    fn test_parse_requires_both_fields() {
        assert!(parse_meminfo("MemTotal: 100 kB\n").is_err());
        assert!(parse_meminfo("MemAvailable: 100 kB\n").is_err());
    }

    #[test]
    fn test_live_sample() {
        // This test relies on /proc being available (Linux only)
        #[cfg(target_os = "linux")]
        {
            let info = sample().unwrap();
            assert!(info.total_kib > 0);
            assert!(info.avail_kib <= info.total_kib);
        }
    }
}
