//! The periodic sampling loop.
//!
//! A [`Sampler`] runs on its own thread. Each tick it reads the OS metrics
//! source and the optional hardware sensor backend, pushes one [`Snapshot`]
//! to the consumer and, once per log interval, hands power and temperatures
//! to a [`PowerTempRecorder`]. Faults never end the loop; only
//! [`SamplerHandle::stop`] (or a vanished consumer) does, and only at the top
//! of an iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::collector::{NetCounters, OsMetrics};
use super::host::HostSensors;
use super::sensors::{SensorBackend, SensorReadings};
use super::snapshot::Snapshot;
use crate::config::SamplerSection;
use crate::error::{SamplerError, StoreError};
use crate::store::MetricsStore;

/// Estimated draw of an idle machine when no power sensor is available.
pub const IDLE_POWER_WATTS: f64 = 15.0;
/// Added on top of the idle draw at 100% CPU.
pub const LOAD_POWER_WATTS: f64 = 50.0;

/// Linear CPU-load power estimate: 15 W idle up to 65 W at full load.
pub fn estimate_power_watts(cpu_percent: f64) -> f64 {
    IDLE_POWER_WATTS + (cpu_percent / 100.0) * LOAD_POWER_WATTS
}

/// Upload and download rates in bytes per second between two counter samples.
pub fn throughput_bps(prev: NetCounters, now: NetCounters, elapsed: Duration) -> (f64, f64) {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return (0.0, 0.0);
    }
    // Counters can go backwards when an interface disappears.
    let sent = now.bytes_sent.saturating_sub(prev.bytes_sent);
    let received = now.bytes_received.saturating_sub(prev.bytes_received);
    (sent as f64 / secs, received as f64 / secs)
}

/// Hottest known temperature; zero readings are unknown.
pub fn combined_temp(cpu_temp_c: f64, gpu_temp_c: f64) -> f64 {
    match (cpu_temp_c > 0.0, gpu_temp_c > 0.0) {
        (true, true) => cpu_temp_c.max(gpu_temp_c),
        (true, false) => cpu_temp_c,
        (false, true) => gpu_temp_c,
        (false, false) => 0.0,
    }
}

/// Receives every snapshot, in tick order. Implementations must return quickly.
pub trait SnapshotSink: Send {
    fn emit(&mut self, snapshot: Snapshot) -> Result<(), SamplerError>;
}

impl SnapshotSink for mpsc::UnboundedSender<Snapshot> {
    fn emit(&mut self, snapshot: Snapshot) -> Result<(), SamplerError> {
        self.send(snapshot).map_err(|_| SamplerError::ConsumerGone)
    }
}

/// Destination for the reduced, slow-cadence power/temperature samples.
pub trait PowerTempRecorder: Send + Sync {
    fn record(&self, power_watts: f64, cpu_temp_c: f64, gpu_temp_c: f64)
    -> Result<(), StoreError>;
}

impl PowerTempRecorder for MetricsStore {
    fn record(
        &self,
        power_watts: f64,
        cpu_temp_c: f64,
        gpu_temp_c: f64,
    ) -> Result<(), StoreError> {
        self.insert(power_watts, cpu_temp_c, gpu_temp_c).map(|_| ())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SamplerState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        StateCell(AtomicU8::new(SamplerState::Created as u8))
    }

    fn get(&self) -> SamplerState {
        match self.0.load(Ordering::Acquire) {
            0 => SamplerState::Created,
            1 => SamplerState::Running,
            2 => SamplerState::Stopping,
            _ => SamplerState::Stopped,
        }
    }

    fn set(&self, state: SamplerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn request_stop(&self) {
        let _ = self.0.compare_exchange(
            SamplerState::Running as u8,
            SamplerState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerConfig {
    pub interval: Duration,
    pub log_interval: Duration,
    pub fault_backoff: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            interval: Duration::from_secs(1),
            log_interval: Duration::from_secs(60),
            fault_backoff: Duration::from_secs(1),
        }
    }
}

impl From<&SamplerSection> for SamplerConfig {
    fn from(section: &SamplerSection) -> Self {
        SamplerConfig {
            interval: section.interval(),
            log_interval: section.log_interval(),
            fault_backoff: section.fault_backoff(),
        }
    }
}

pub struct Sampler {
    config: SamplerConfig,
    metrics: Box<dyn OsMetrics>,
    backend: Option<Box<dyn SensorBackend>>,
    sink: Box<dyn SnapshotSink>,
    recorder: Option<Arc<dyn PowerTempRecorder>>,
    state: Arc<StateCell>,
    /// Last counter reading and when it was taken.
    prev_net: Option<(NetCounters, Instant)>,
    last_logged: Instant,
}

impl Sampler {
    pub fn new(
        config: SamplerConfig,
        metrics: Box<dyn OsMetrics>,
        sink: Box<dyn SnapshotSink>,
    ) -> Self {
        Sampler {
            config,
            metrics,
            backend: None,
            sink,
            recorder: None,
            state: Arc::new(StateCell::new()),
            prev_net: None,
            last_logged: Instant::now(),
        }
    }

    pub fn with_backend(mut self, backend: Option<Box<dyn SensorBackend>>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn PowerTempRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Open the host sensor backend. Missing sensors are a normal condition.
    pub fn open_host_backend() -> Option<Box<dyn SensorBackend>> {
        match HostSensors::open() {
            Ok(backend) => {
                info!(backend = backend.name(), "hardware sensors available");
                Some(Box::new(backend))
            }
            Err(err) => {
                info!(reason = %err, "hardware sensors unavailable, estimating power from CPU load");
                None
            }
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state.get()
    }

    /// Spawn the sampling thread.
    pub fn start(self) -> Result<SamplerHandle, SamplerError> {
        let state = Arc::clone(&self.state);
        state.set(SamplerState::Running);
        let spawned = thread::Builder::new()
            .name("sampler".to_string())
            .spawn(move || self.run());
        match spawned {
            Ok(thread) => Ok(SamplerHandle {
                state,
                thread: Some(thread),
            }),
            Err(err) => {
                state.set(SamplerState::Stopped);
                Err(SamplerError::Spawn(err))
            }
        }
    }

    fn run(mut self) {
        debug!(interval_ms = self.config.interval.as_millis() as u64, "sampler started");
        let started = Instant::now();
        self.prev_net = self
            .metrics
            .network_counters()
            .ok()
            .map(|counters| (counters, started));
        self.last_logged = started;
        let mut last_tick = started;

        while self.state.get() == SamplerState::Running {
            let elapsed = last_tick.elapsed();
            if elapsed < self.config.interval {
                thread::sleep(self.config.interval - elapsed);
            }
            let now = Instant::now();
            last_tick = now;

            match self.tick(now) {
                Ok(_) => {}
                Err(SamplerError::ConsumerGone) => {
                    info!("snapshot consumer disconnected, stopping sampler");
                    self.state.request_stop();
                }
                Err(err) => {
                    warn!(error = %err, "sampler tick failed");
                    thread::sleep(self.config.fault_backoff);
                }
            }
        }

        if let Some(mut backend) = self.backend.take() {
            backend.close();
            debug!(backend = backend.name(), "sensor backend released");
        }
        self.state.set(SamplerState::Stopped);
        debug!("sampler stopped");
    }

    /// One iteration of work after the interval wait: read, assemble, emit, log.
    ///
    /// Network counters are read first so the baseline moves even when a later
    /// read faults; rates are taken over the time since that baseline.
    pub fn tick(&mut self, now: Instant) -> Result<Snapshot, SamplerError> {
        let counters = self.metrics.network_counters()?;
        let (net_up_bps, net_down_bps) = match self.prev_net.replace((counters, now)) {
            Some((prev, at)) => throughput_bps(prev, counters, now.saturating_duration_since(at)),
            None => (0.0, 0.0),
        };

        let cpu_percent = self.metrics.cpu_percent()?;
        let cpu_percent = if cpu_percent.is_finite() {
            cpu_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let memory = self.metrics.memory()?;

        let readings = self.read_sensors();
        let power_watts = if readings.cpu_power_watts > 0.0 {
            readings.cpu_power_watts
        } else {
            estimate_power_watts(cpu_percent)
        };

        let snapshot = Snapshot {
            cpu_percent,
            ram_used_bytes: memory.used_bytes.min(memory.total_bytes),
            ram_total_bytes: memory.total_bytes,
            net_up_bps,
            net_down_bps,
            gpu_percent: readings.gpu_load_percent.clamp(0.0, 100.0),
            power_watts,
            cpu_temp_c: readings.cpu_temp_c,
            gpu_temp_c: readings.gpu_temp_c,
            combined_temp_c: combined_temp(readings.cpu_temp_c, readings.gpu_temp_c),
        };

        self.sink.emit(snapshot)?;
        self.maybe_record(&snapshot, now);
        Ok(snapshot)
    }

    fn read_sensors(&mut self) -> SensorReadings {
        let Some(backend) = self.backend.as_mut() else {
            return SensorReadings::default();
        };
        match backend.poll() {
            Ok(units) => SensorReadings::fold(&units),
            Err(err) => {
                debug!(backend = backend.name(), error = %err, "sensor poll failed");
                SensorReadings::default()
            }
        }
    }

    fn maybe_record(&mut self, snapshot: &Snapshot, now: Instant) {
        if now.saturating_duration_since(self.last_logged) < self.config.log_interval {
            return;
        }
        let Some(recorder) = &self.recorder else {
            return;
        };
        // A failed point is dropped, not retried on the next tick.
        self.last_logged = now;
        if let Err(err) = recorder.record(
            snapshot.power_watts,
            snapshot.cpu_temp_c,
            snapshot.gpu_temp_c,
        ) {
            warn!(error = %err, "failed to persist power reading");
        }
    }
}

/// Control handle for a running [`Sampler`]. Dropping it requests a stop.
pub struct SamplerHandle {
    state: Arc<StateCell>,
    thread: Option<JoinHandle<()>>,
}

impl SamplerHandle {
    /// Ask the loop to exit at its next iteration boundary.
    pub fn stop(&self) {
        self.state.request_stop();
    }

    pub fn state(&self) -> SamplerState {
        self.state.get()
    }

    /// Wait for the sampling thread to finish.
    pub fn join(mut self) -> Result<(), SamplerError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| SamplerError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.state.request_stop();
    }
}
