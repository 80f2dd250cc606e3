use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysmonbar::error::{SamplerError, SensorError};
use sysmonbar::store::MetricsStore;
use sysmonbar::system::collector::{MemoryUsage, NetCounters, OsMetrics};
use sysmonbar::system::sampler::{Sampler, SamplerConfig, SamplerState, SnapshotSink};
use sysmonbar::system::sensors::{HardwareKind, HardwareUnit, Sensor, SensorBackend, SensorKind};
use sysmonbar::system::snapshot::Snapshot;

fn fast_config() -> SamplerConfig {
    SamplerConfig {
        interval: Duration::from_millis(10),
        log_interval: Duration::from_secs(60),
        fault_backoff: Duration::from_millis(10),
    }
}

/// Metrics source whose CPU read fails on every `fail_every`th call.
struct FlakyMetrics {
    calls: usize,
    fail_every: usize,
    sent: u64,
}

impl FlakyMetrics {
    fn steady() -> Self {
        FlakyMetrics {
            calls: 0,
            fail_every: 0,
            sent: 0,
        }
    }
}

impl OsMetrics for FlakyMetrics {
    fn cpu_percent(&mut self) -> Result<f64, SamplerError> {
        self.calls += 1;
        if self.fail_every > 0 && self.calls % self.fail_every == 0 {
            return Err(SamplerError::Source("counter query failed".into()));
        }
        Ok(50.0)
    }

    fn memory(&mut self) -> Result<MemoryUsage, SamplerError> {
        Ok(MemoryUsage {
            used_bytes: 2 << 30,
            total_bytes: 8 << 30,
        })
    }

    fn network_counters(&mut self) -> Result<NetCounters, SamplerError> {
        self.sent += 1000;
        Ok(NetCounters {
            bytes_sent: self.sent,
            bytes_received: self.sent * 2,
        })
    }
}

#[derive(Clone, Default)]
struct CollectSink(Arc<Mutex<Vec<Snapshot>>>);

impl SnapshotSink for CollectSink {
    fn emit(&mut self, snapshot: Snapshot) -> Result<(), SamplerError> {
        self.0.lock().push(snapshot);
        Ok(())
    }
}

impl CollectSink {
    fn len(&self) -> usize {
        self.0.lock().len()
    }
}

struct TrackedBackend {
    polls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl SensorBackend for TrackedBackend {
    fn name(&self) -> &str {
        "tracked"
    }

    fn poll(&mut self) -> Result<Vec<HardwareUnit>, SensorError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![HardwareUnit {
            name: "cpu".into(),
            kind: HardwareKind::Cpu,
            sensors: vec![
                Sensor::new("CPU Package", SensorKind::Power, Some(42.0)),
                Sensor::new("Tctl", SensorKind::Temperature, Some(58.0)),
            ],
        }])
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn start_stop_lifecycle_releases_backend() {
    let sink = CollectSink::default();
    let polls = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicBool::new(false));
    let backend = TrackedBackend {
        polls: polls.clone(),
        closed: closed.clone(),
    };

    let sampler = Sampler::new(
        fast_config(),
        Box::new(FlakyMetrics::steady()),
        Box::new(sink.clone()),
    )
    .with_backend(Some(Box::new(backend)));
    assert_eq!(sampler.state(), SamplerState::Created);

    let handle = sampler.start().unwrap();
    assert!(matches!(
        handle.state(),
        SamplerState::Running | SamplerState::Stopping | SamplerState::Stopped
    ));
    assert!(wait_until(Duration::from_secs(5), || sink.len() >= 3));

    handle.stop();
    assert_ne!(handle.state(), SamplerState::Running);
    handle.join().unwrap();

    assert!(closed.load(Ordering::SeqCst));
    assert!(polls.load(Ordering::SeqCst) >= 3);

    let snapshots = sink.0.lock();
    assert!(snapshots.iter().all(|s| s.power_watts == 42.0));
    assert!(snapshots.iter().all(|s| s.cpu_temp_c == 58.0));
    // Counters grow by 1000 bytes per read, so every tick sees positive upload.
    assert!(snapshots.iter().all(|s| s.net_up_bps > 0.0));
    assert!(snapshots.iter().all(|s| s.net_down_bps >= s.net_up_bps));
}

#[test]
fn no_snapshots_after_join() {
    let sink = CollectSink::default();
    let handle = Sampler::new(
        fast_config(),
        Box::new(FlakyMetrics::steady()),
        Box::new(sink.clone()),
    )
    .start()
    .unwrap();
    assert!(wait_until(Duration::from_secs(5), || sink.len() >= 1));

    handle.stop();
    handle.join().unwrap();
    let after_join = sink.len();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sink.len(), after_join);
}

#[test]
fn tick_faults_do_not_end_the_loop() {
    let sink = CollectSink::default();
    let metrics = FlakyMetrics {
        fail_every: 2,
        ..FlakyMetrics::steady()
    };
    let handle = Sampler::new(fast_config(), Box::new(metrics), Box::new(sink.clone()))
        .start()
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || sink.len() >= 4));
    assert_eq!(handle.state(), SamplerState::Running);
    handle.stop();
    handle.join().unwrap();
}

#[test]
fn dropped_receiver_stops_the_sampler() {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Snapshot>();
    drop(rx);
    let handle = Sampler::new(fast_config(), Box::new(FlakyMetrics::steady()), Box::new(tx))
        .start()
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        handle.state() == SamplerState::Stopped
    }));
    handle.join().unwrap();
}

#[test]
fn dropping_the_handle_requests_stop() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Snapshot>();
    let handle = Sampler::new(fast_config(), Box::new(FlakyMetrics::steady()), Box::new(tx))
        .start()
        .unwrap();
    drop(handle);

    // The sender is dropped once the thread exits, closing the channel.
    let start = Instant::now();
    loop {
        match rx.try_recv() {
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => break,
            _ if start.elapsed() > Duration::from_secs(5) => panic!("sampler kept running"),
            _ => thread::sleep(Duration::from_millis(5)),
        }
    }
}

#[test]
fn persists_readings_through_the_store() {
    let store = Arc::new(MetricsStore::open_in_memory().unwrap());
    let sink = CollectSink::default();
    let config = SamplerConfig {
        log_interval: Duration::ZERO,
        ..fast_config()
    };
    let handle = Sampler::new(config, Box::new(FlakyMetrics::steady()), Box::new(sink.clone()))
        .with_recorder(store.clone())
        .start()
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        store.count().unwrap_or(0) >= 3
    }));
    handle.stop();
    handle.join().unwrap();

    let records = store.query_range(Duration::from_secs(3600)).unwrap();
    assert_eq!(records.len() as u64, store.count().unwrap());
    // No backend: 15 W idle + 50% of the 50 W load range.
    assert!(records.iter().all(|r| r.power_watts == 40.0));
    assert!(records.windows(2).all(|w| w[0].id < w[1].id));

    let store = Arc::try_unwrap(store).ok().unwrap();
    store.close().unwrap();
}
