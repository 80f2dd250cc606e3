//! Hardware sensor model and the rules that fold raw sensor readings into the
//! power, temperature and GPU load figures of a [`Snapshot`].
//!
//! Backends describe what they see as [`HardwareUnit`]s. Label matching lives in
//! the small predicate functions below so the override rules stay testable.
//!
//! [`Snapshot`]: super::snapshot::Snapshot

use tracing::trace;

use crate::error::SensorError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HardwareKind {
    Cpu,
    Gpu,
    Other,
}

impl HardwareKind {
    /// Classify a hardware or chip label (e.g. `k10temp`, `amdgpu`, `coretemp`).
    pub fn classify(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        const GPU_HINTS: [&str; 6] = ["gpu", "amdgpu", "nvidia", "nouveau", "radeon", "i915"];
        const CPU_HINTS: [&str; 7] = [
            "cpu", "coretemp", "k10temp", "zenpower", "package", "tctl", "tdie",
        ];
        if GPU_HINTS.iter().any(|hint| label.contains(hint)) {
            HardwareKind::Gpu
        } else if CPU_HINTS.iter().any(|hint| label.contains(hint)) {
            HardwareKind::Cpu
        } else {
            HardwareKind::Other
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorKind {
    Power,
    Load,
    Temperature,
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sensor {
    pub name: String,
    pub kind: SensorKind,
    /// `Ok(None)` is a sensor that exists but currently has no value.
    pub value: Result<Option<f64>, SensorError>,
}

impl Sensor {
    pub fn new(name: impl Into<String>, kind: SensorKind, value: Option<f64>) -> Self {
        Sensor {
            name: name.into(),
            kind,
            value: Ok(value),
        }
    }

    pub fn failed(name: impl Into<String>, kind: SensorKind, error: SensorError) -> Self {
        Sensor {
            name: name.into(),
            kind,
            value: Err(error),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HardwareUnit {
    pub name: String,
    pub kind: HardwareKind,
    pub sensors: Vec<Sensor>,
}

/// A source of hardware units and their sensors.
///
/// The sampler thread is the only owner of a backend; `close` runs once when
/// the sampler stops.
pub trait SensorBackend: Send {
    fn name(&self) -> &str;

    /// Refresh every unit and return the current readings.
    fn poll(&mut self) -> Result<Vec<HardwareUnit>, SensorError>;

    fn close(&mut self) {}
}

fn label_contains(name: &str, needle: &str) -> bool {
    name.to_ascii_lowercase().contains(needle)
}

/// A CPU power reading for the whole package rather than a core or rail.
pub fn is_package_power(name: &str) -> bool {
    label_contains(name, "package")
}

/// The primary die / control temperature (`Tctl`, `Tdie`).
pub fn is_primary_die_temp(name: &str) -> bool {
    label_contains(name, "tctl") || label_contains(name, "tdie")
}

/// The GPU's 3D engine utilisation (`D3D 3D`, `GPU 3D`).
pub fn is_3d_engine_load(name: &str) -> bool {
    label_contains(name, "3d")
}

pub fn is_core_load(name: &str) -> bool {
    label_contains(name, "core")
}

/// Sensor-derived figures for one tick. Zero means "no reading".
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorReadings {
    pub cpu_power_watts: f64,
    pub cpu_temp_c: f64,
    pub gpu_temp_c: f64,
    pub gpu_load_percent: f64,
    gpu_load_from_3d: bool,
}

impl SensorReadings {
    pub fn fold(units: &[HardwareUnit]) -> Self {
        let mut readings = SensorReadings::default();
        for unit in units {
            for sensor in &unit.sensors {
                let value = match &sensor.value {
                    Ok(value) => *value,
                    Err(err) => {
                        trace!(unit = %unit.name, error = %err, "sensor read failed");
                        continue;
                    }
                };
                match unit.kind {
                    HardwareKind::Cpu => readings.apply_cpu(sensor, value),
                    HardwareKind::Gpu => readings.apply_gpu(sensor, value),
                    HardwareKind::Other => {}
                }
            }
        }
        readings
    }

    fn apply_cpu(&mut self, sensor: &Sensor, value: Option<f64>) {
        let Some(value) = value.filter(|v| *v > 0.0) else {
            return;
        };
        match sensor.kind {
            SensorKind::Power => {
                if is_package_power(&sensor.name) || value > self.cpu_power_watts {
                    self.cpu_power_watts = value;
                }
            }
            SensorKind::Temperature => {
                if self.cpu_temp_c == 0.0 || is_primary_die_temp(&sensor.name) {
                    self.cpu_temp_c = value;
                }
            }
            _ => {}
        }
    }

    fn apply_gpu(&mut self, sensor: &Sensor, value: Option<f64>) {
        match sensor.kind {
            SensorKind::Load => {
                let Some(value) = value else {
                    return;
                };
                if is_3d_engine_load(&sensor.name) {
                    self.gpu_load_percent = value;
                    self.gpu_load_from_3d = true;
                } else if is_core_load(&sensor.name)
                    && !self.gpu_load_from_3d
                    && self.gpu_load_percent == 0.0
                {
                    self.gpu_load_percent = value;
                }
            }
            SensorKind::Temperature => {
                if let Some(value) = value.filter(|v| *v > 0.0)
                    && self.gpu_temp_c == 0.0
                {
                    self.gpu_temp_c = value;
                }
            }
            _ => {}
        }
    }
}
