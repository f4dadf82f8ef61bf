//! GPU load, branched on the driver-reported vendor
//!
//! AMD exposes a busy percentage through the drm sysfs tree. NVIDIA has no
//! sysfs equivalent, so that branch shells out to nvidia-smi. Both paths
//! run on the gpu sampler lane only.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::domain::GpuVendor;

/// Sample GPU utilization as a 0..=100 percentage.
///
/// # Errors
/// Fails when the vendor's counter is absent or unreadable; the lane
/// treats that as "keep the previous value".
pub fn sample(vendor: GpuVendor) -> Result<u32> {
    match vendor {
        GpuVendor::Amd => sample_amd(Path::new("/sys/class/drm")),
        GpuVendor::Nvidia => sample_nvidia(),
    }
}

fn sample_amd(drm_root: &Path) -> Result<u32> {
    let entries = fs::read_dir(drm_root)
        .with_context(|| format!("Failed to read {}", drm_root.display()))?;
    for entry in entries.flatten() {
        let busy = entry.path().join("device/gpu_busy_percent");
        if busy.exists() {
            let text = fs::read_to_string(&busy)
                .with_context(|| format!("Failed to read {}", busy.display()))?;
            return text.trim().parse().context("Malformed gpu_busy_percent");
        }
    }
    bail!("No amdgpu busy counter under {}", drm_root.display());
}

fn sample_nvidia() -> Result<u32> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=utilization.gpu", "--format=csv,noheader,nounits"])
        .output()
        .context("Failed to run nvidia-smi")?;
    if !output.status.success() {
        bail!("nvidia-smi exited with {}", output.status);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next().context("Empty nvidia-smi output")?;
    first.trim().parse().context("Malformed nvidia-smi utilization")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_amd_reads_busy_percent_from_sysfs_layout() {
        let root = tempfile::tempdir().unwrap();
        let device = root.path().join("card0/device");
        fs::create_dir_all(&device).unwrap();
        let mut file = fs::File::create(device.join("gpu_busy_percent")).unwrap();
        writeln!(file, "37").unwrap();

        assert_eq!(sample_amd(root.path()).unwrap(), 37);
    }

    #[test]
    fn test_amd_fails_without_a_counter() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("card0/device")).unwrap();
        assert!(sample_amd(root.path()).is_err());
    }
}
