use super::{EnergyCounter, PlatformExtensions};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn package_energy() -> Option<EnergyCounter> {
        // Package energy needs the private IOReport interface
        None
    }

    fn gpu_busy_percent() -> Option<f64> {
        None
    }
}
