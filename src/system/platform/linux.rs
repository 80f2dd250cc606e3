use std::fs;
use std::path::{Path, PathBuf};

use super::{EnergyCounter, PlatformExtensions};

pub struct Platform;

const RAPL_PACKAGE_ZONE: &str = "/sys/class/powercap/intel-rapl:0";
const DRM_ROOT: &str = "/sys/class/drm";

fn read_u64(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// `cardN` entries only; `card0-DP-1` style connectors are skipped.
fn drm_devices() -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(DRM_ROOT) else {
        return Vec::new();
    };
    let mut devices: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.strip_prefix("card")
                .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        })
        .map(|entry| entry.path().join("device"))
        .collect();
    devices.sort();
    devices
}

impl PlatformExtensions for Platform {
    fn package_energy() -> Option<EnergyCounter> {
        let zone = Path::new(RAPL_PACKAGE_ZONE);
        let energy_uj = read_u64(&zone.join("energy_uj"))?;
        let max_range_uj = read_u64(&zone.join("max_energy_range_uj")).unwrap_or(u64::MAX);
        Some(EnergyCounter {
            energy_uj,
            max_range_uj,
        })
    }

    fn gpu_busy_percent() -> Option<f64> {
        // amdgpu exposes a whole-device busy figure; i915/nvidia do not
        drm_devices()
            .iter()
            .find_map(|dev| read_u64(&dev.join("gpu_busy_percent")))
            .map(|pct| pct.min(100) as f64)
    }
}
