use serde::Serialize;

/// One tick's assembled readings. Temperatures of `0.0` mean "unknown".
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub cpu_percent: f64,
    pub ram_used_bytes: u64,
    pub ram_total_bytes: u64,
    pub net_up_bps: f64,
    pub net_down_bps: f64,
    pub gpu_percent: f64,
    pub power_watts: f64,
    pub cpu_temp_c: f64,
    pub gpu_temp_c: f64,
    pub combined_temp_c: f64,
}

impl Snapshot {
    pub fn ram_percent(&self) -> f64 {
        if self.ram_total_bytes == 0 {
            return 0.0;
        }
        self.ram_used_bytes as f64 / self.ram_total_bytes as f64 * 100.0
    }
}
