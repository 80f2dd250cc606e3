use std::collections::VecDeque;

use super::snapshot::Snapshot;

const DEFAULT_CAPACITY: usize = 60;

/// Fixed-capacity series; the oldest value is dropped once full.
#[derive(Debug, Clone)]
pub struct Series {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Series {
    fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn values(&self) -> &VecDeque<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn peak(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

/// Recent snapshots kept for graph-style indicators.
#[derive(Debug)]
pub struct SnapshotHistory {
    pub cpu: Series,
    pub gpu: Series,
    pub ram: Series,
    /// Combined up + down throughput in bytes per second.
    pub net: Series,
    latest: Option<Snapshot>,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cpu: Series::new(capacity),
            gpu: Series::new(capacity),
            ram: Series::new(capacity),
            net: Series::new(capacity),
            latest: None,
        }
    }

    pub fn record(&mut self, snapshot: Snapshot) {
        self.cpu.push(snapshot.cpu_percent);
        self.gpu.push(snapshot.gpu_percent);
        self.ram.push(snapshot.ram_percent());
        self.net.push(snapshot.net_up_bps + snapshot.net_down_bps);
        self.latest = Some(snapshot);
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cpu: f64) -> Snapshot {
        Snapshot {
            cpu_percent: cpu,
            ram_used_bytes: 1,
            ram_total_bytes: 4,
            net_up_bps: 10.0,
            net_down_bps: 30.0,
            ..Default::default()
        }
    }

    #[test]
    fn record_tracks_latest() {
        let mut history = SnapshotHistory::new(60);
        assert!(history.latest().is_none());
        history.record(snapshot(5.0));
        history.record(snapshot(10.0));
        assert_eq!(history.cpu.len(), 2);
        assert_eq!(history.latest().unwrap().cpu_percent, 10.0);
        assert_eq!(history.ram.values()[0], 25.0);
        assert_eq!(history.net.values()[1], 40.0);
    }

    #[test]
    fn ring_buffer_caps_at_capacity() {
        let mut history = SnapshotHistory::new(5);
        for i in 0..10 {
            history.record(snapshot(i as f64));
        }
        assert_eq!(history.cpu.len(), 5);
        assert_eq!(history.cpu.values()[0], 5.0);
        assert_eq!(history.cpu.values()[4], 9.0);
        assert_eq!(history.cpu.peak(), 9.0);
    }

    #[test]
    fn zero_capacity_still_keeps_one_value() {
        let mut history = SnapshotHistory::new(0);
        history.record(snapshot(1.0));
        history.record(snapshot(2.0));
        assert_eq!(history.cpu.len(), 1);
    }
}
