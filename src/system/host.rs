use std::time::Instant;

use sysinfo::Components;

use super::platform::{self, EnergyCounter};
use super::sensors::{HardwareKind, HardwareUnit, Sensor, SensorBackend, SensorKind};
use crate::error::SensorError;

const PACKAGE_SENSOR: &str = "CPU Package";

/// Sensor backend over `sysinfo` components plus the platform's package
/// energy and GPU busy counters.
pub struct HostSensors {
    components: Components,
    last_energy: Option<(EnergyCounter, Instant)>,
}

impl HostSensors {
    pub fn open() -> Result<Self, SensorError> {
        let components = Components::new_with_refreshed_list();
        let has_power = platform::package_energy().is_some();
        let has_gpu = platform::gpu_busy_percent().is_some();
        if components.list().is_empty() && !has_power && !has_gpu {
            return Err(SensorError::unavailable("no hardware sensors found"));
        }
        Ok(HostSensors {
            components,
            last_energy: None,
        })
    }

    /// Package watts need two counter samples, so the first poll reports no value.
    fn package_power(&mut self) -> Option<Sensor> {
        let counter = platform::package_energy()?;
        let now = Instant::now();
        let sensor = match self.last_energy {
            None => Sensor::new(PACKAGE_SENSOR, SensorKind::Power, None),
            Some((prev, at)) => {
                match energy_to_watts(prev, counter, now.duration_since(at).as_secs_f64()) {
                    Some(watts) => Sensor::new(PACKAGE_SENSOR, SensorKind::Power, Some(watts)),
                    None => Sensor::failed(
                        PACKAGE_SENSOR,
                        SensorKind::Power,
                        SensorError::read(PACKAGE_SENSOR, "unusable energy counter delta"),
                    ),
                }
            }
        };
        self.last_energy = Some((counter, now));
        Some(sensor)
    }
}

/// Average power between two energy samples, handling one counter wrap.
pub fn energy_to_watts(prev: EnergyCounter, now: EnergyCounter, elapsed_secs: f64) -> Option<f64> {
    if elapsed_secs <= 0.0 {
        return None;
    }
    let delta_uj = if now.energy_uj >= prev.energy_uj {
        now.energy_uj - prev.energy_uj
    } else {
        prev.max_range_uj
            .checked_sub(prev.energy_uj)?
            .saturating_add(now.energy_uj)
    };
    Some(delta_uj as f64 / 1_000_000.0 / elapsed_secs)
}

impl SensorBackend for HostSensors {
    fn name(&self) -> &str {
        "host"
    }

    fn poll(&mut self) -> Result<Vec<HardwareUnit>, SensorError> {
        self.components.refresh(true);

        let mut cpu = Vec::new();
        let mut gpu = Vec::new();
        let mut other = Vec::new();
        for component in self.components.list() {
            let label = component.label();
            let sensor = Sensor::new(
                label,
                SensorKind::Temperature,
                component.temperature().map(f64::from),
            );
            match HardwareKind::classify(label) {
                HardwareKind::Cpu => cpu.push(sensor),
                HardwareKind::Gpu => gpu.push(sensor),
                HardwareKind::Other => other.push(sensor),
            }
        }

        if let Some(power) = self.package_power() {
            cpu.push(power);
        }
        if let Some(busy) = platform::gpu_busy_percent() {
            gpu.push(Sensor::new("GPU Core", SensorKind::Load, Some(busy)));
        }

        let units = [
            ("cpu", HardwareKind::Cpu, cpu),
            ("gpu", HardwareKind::Gpu, gpu),
            ("other", HardwareKind::Other, other),
        ]
        .into_iter()
        .filter(|(_, _, sensors)| !sensors.is_empty())
        .map(|(name, kind, sensors)| HardwareUnit {
            name: name.to_string(),
            kind,
            sensors,
        })
        .collect();
        Ok(units)
    }

    fn close(&mut self) {
        self.last_energy = None;
    }
}
