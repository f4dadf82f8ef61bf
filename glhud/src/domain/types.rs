//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep host-owned handles opaque and make function
//! signatures more expressive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host rendering-context identity
///
/// Address-sized and strictly opaque: the layer compares and hashes these,
/// never dereferences them. The host owns the object behind the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey(pub usize);

impl ContextKey {
    #[must_use]
    pub fn from_ptr(ptr: *mut libc::c_void) -> Self {
        ContextKey(ptr as usize)
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx:0x{:x}", self.0)
    }
}

/// Metric kinds the HUD can display
///
/// `index` addresses ring-buffer cells and sampler lanes, so the values
/// here and the lane layout must stay in step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Gpu,
    Memory,
    Io,
}

impl MetricKind {
    pub const COUNT: usize = 4;
    pub const ALL: [MetricKind; Self::COUNT] =
        [MetricKind::Cpu, MetricKind::Gpu, MetricKind::Memory, MetricKind::Io];

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            MetricKind::Cpu => 0,
            MetricKind::Gpu => 1,
            MetricKind::Memory => 2,
            MetricKind::Io => 3,
        }
    }

    /// Short lowercase name, used for lane thread names and config keys.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Gpu => "gpu",
            MetricKind::Memory => "memory",
            MetricKind::Io => "io",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// GPU vendor, branched on the renderer string the driver reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    Amd,
    Nvidia,
}

impl GpuVendor {
    /// Substring match against known vendor tokens.
    ///
    /// Anything not recognizably AMD is treated as NVIDIA; the stat source
    /// for NVIDIA degrades gracefully when the tool stack is absent.
    #[must_use]
    pub fn from_renderer(renderer: &str) -> Self {
        const AMD_TOKENS: [&str; 2] = ["Radeon", "AMD"];
        if AMD_TOKENS.iter().any(|token| renderer.contains(token)) {
            GpuVendor::Amd
        } else {
            GpuVendor::Nvidia
        }
    }
}

/// Host viewport rectangle as reported by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_key_display() {
        assert_eq!(ContextKey(0x7f42).to_string(), "ctx:0x7f42");
    }

    #[test]
    fn test_metric_kind_indices_are_dense() {
        for (position, kind) in MetricKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), position);
        }
    }

    #[test]
    fn test_vendor_from_renderer() {
        assert_eq!(GpuVendor::from_renderer("AMD Radeon RX 7900 XTX"), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_renderer("Radeon HD 7970"), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_renderer("NVIDIA GeForce RTX 3060"), GpuVendor::Nvidia);
        // Unrecognized strings fall through to the NVIDIA branch
        assert_eq!(GpuVendor::from_renderer("Mesa Intel Iris Xe"), GpuVendor::Nvidia);
    }
}
