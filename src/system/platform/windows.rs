use super::{EnergyCounter, PlatformExtensions};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn package_energy() -> Option<EnergyCounter> {
        // MSR access requires a kernel driver
        None
    }

    fn gpu_busy_percent() -> Option<f64> {
        None
    }
}
