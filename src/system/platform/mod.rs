/// Raw RAPL-style energy counter in microjoules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnergyCounter {
    pub energy_uj: u64,
    /// Value at which the counter wraps back to zero.
    pub max_range_uj: u64,
}

pub trait PlatformExtensions {
    fn package_energy() -> Option<EnergyCounter>;
    fn gpu_busy_percent() -> Option<f64>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn package_energy() -> Option<EnergyCounter> {
    platform_impl::Platform::package_energy()
}

pub fn gpu_busy_percent() -> Option<f64> {
    platform_impl::Platform::gpu_busy_percent()
}
