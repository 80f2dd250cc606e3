use sysinfo::{MemoryRefreshKind, Networks, System};

use crate::error::SamplerError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// Cumulative bytes moved across all interfaces since boot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// The OS-level metrics the sampler reads every tick.
///
/// `cpu_percent` may average over the time since its previous call, the way
/// most platform counters do.
pub trait OsMetrics: Send {
    fn cpu_percent(&mut self) -> Result<f64, SamplerError>;
    fn memory(&mut self) -> Result<MemoryUsage, SamplerError>;
    fn network_counters(&mut self) -> Result<NetCounters, SamplerError>;
}

pub struct SysinfoMetrics {
    sys: System,
    networks: Networks,
}

impl Default for SysinfoMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoMetrics {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        // Prime the usage counters so the first tick reports a real delta.
        sys.refresh_cpu_usage();
        let networks = Networks::new_with_refreshed_list();
        SysinfoMetrics { sys, networks }
    }
}

impl OsMetrics for SysinfoMetrics {
    fn cpu_percent(&mut self) -> Result<f64, SamplerError> {
        self.sys.refresh_cpu_usage();
        Ok(f64::from(self.sys.global_cpu_usage()))
    }

    fn memory(&mut self) -> Result<MemoryUsage, SamplerError> {
        self.sys
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        let total_bytes = self.sys.total_memory();
        if total_bytes == 0 {
            return Err(SamplerError::source("memory total reported as zero"));
        }
        Ok(MemoryUsage {
            used_bytes: self.sys.used_memory(),
            total_bytes,
        })
    }

    fn network_counters(&mut self) -> Result<NetCounters, SamplerError> {
        self.networks.refresh(true);
        let counters = self
            .networks
            .iter()
            .fold(NetCounters::default(), |acc, (_, data)| NetCounters {
                bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                bytes_received: acc.bytes_received.saturating_add(data.total_received()),
            });
        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_metrics_respect_basic_invariants() {
        let mut metrics = SysinfoMetrics::new();
        let cpu = metrics.cpu_percent().unwrap();
        assert!(cpu >= 0.0);
        if let Ok(mem) = metrics.memory() {
            assert!(mem.total_bytes > 0);
        }
        let _ = metrics.network_counters().unwrap();
    }
}
