use crate::config::DisplayConfig;
use crate::system::history::{Series, SnapshotHistory};
use crate::system::snapshot::Snapshot;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RamUnit {
    #[default]
    Gb,
    Mb,
}

impl RamUnit {
    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "mb" => RamUnit::Mb,
            _ => RamUnit::Gb,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetUnit {
    #[default]
    Kbps,
    Mbps,
    KBps,
    MBps,
}

impl NetUnit {
    /// Case matters: `kbps` is bits, `KBps` is bytes.
    pub fn from_str_config(s: &str) -> Self {
        match s {
            "mbps" => NetUnit::Mbps,
            "KBps" => NetUnit::KBps,
            "MBps" => NetUnit::MBps,
            _ => NetUnit::Kbps,
        }
    }
}

pub fn format_ram(used_bytes: u64, total_bytes: u64, unit: RamUnit) -> String {
    let used = used_bytes as f64 / GIB;
    let total = total_bytes as f64 / GIB;
    match unit {
        RamUnit::Gb => format!("{used:.1}/{total:.1}GB"),
        RamUnit::Mb => format!("{:.0}/{:.0}MB", used * 1024.0, total * 1024.0),
    }
}

pub fn format_rate(bytes_per_sec: f64, unit: NetUnit) -> String {
    match unit {
        NetUnit::Kbps => format!("{:.1}kbps", bytes_per_sec * 8.0 / 1024.0),
        NetUnit::Mbps => format!("{:.2}mbps", bytes_per_sec * 8.0 / 1024.0 / 1024.0),
        NetUnit::KBps => format!("{:.1}KB/s", bytes_per_sec / 1024.0),
        NetUnit::MBps => format!("{:.2}MB/s", bytes_per_sec / 1024.0 / 1024.0),
    }
}

pub fn format_net(up_bps: f64, down_bps: f64, unit: NetUnit) -> String {
    format!(
        "↓{} ↑{}",
        format_rate(down_bps, unit),
        format_rate(up_bps, unit)
    )
}

pub fn format_watts(watts: f64) -> String {
    format!("{}W", watts as i64)
}

/// Zero is an unknown temperature and renders as `--`.
pub fn format_temp(celsius: f64) -> String {
    if celsius > 0.0 {
        format!("{}°C", celsius as i64)
    } else {
        "--°C".to_string()
    }
}

pub fn sparkline(series: &Series, max: f64) -> String {
    if max <= 0.0 {
        return SPARK_LEVELS[0].to_string().repeat(series.len());
    }
    series
        .values()
        .iter()
        .map(|v| {
            let ratio = (v / max).clamp(0.0, 1.0);
            let idx = (ratio * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[idx]
        })
        .collect()
}

fn with_graph(text: String, graph: Option<String>) -> String {
    match graph {
        Some(graph) => format!("{text} {graph}"),
        None => text,
    }
}

/// One-line rendering of the enabled indicators. With `display.graph` set and
/// a history supplied, CPU, RAM, GPU and network each get a trailing sparkline.
pub fn status_line(
    snapshot: &Snapshot,
    display: &DisplayConfig,
    graphs: Option<&SnapshotHistory>,
) -> String {
    let ram_unit = RamUnit::from_str_config(&display.ram_unit);
    let net_unit = NetUnit::from_str_config(&display.net_unit);
    let graphs = graphs.filter(|_| display.graph);

    let mut parts = Vec::with_capacity(6);
    if display.show_cpu {
        parts.push(with_graph(
            format!("CPU {:.0}%", snapshot.cpu_percent),
            graphs.map(|h| sparkline(&h.cpu, 100.0)),
        ));
    }
    if display.show_ram {
        parts.push(with_graph(
            format!(
                "RAM {}",
                format_ram(snapshot.ram_used_bytes, snapshot.ram_total_bytes, ram_unit)
            ),
            graphs.map(|h| sparkline(&h.ram, 100.0)),
        ));
    }
    if display.show_gpu {
        parts.push(with_graph(
            format!("GPU {:.0}%", snapshot.gpu_percent),
            graphs.map(|h| sparkline(&h.gpu, 100.0)),
        ));
    }
    if display.show_net {
        // Throughput has no fixed ceiling, so the graph scales to the window's peak.
        parts.push(with_graph(
            format_net(snapshot.net_up_bps, snapshot.net_down_bps, net_unit),
            graphs.map(|h| sparkline(&h.net, h.net.peak())),
        ));
    }
    if display.show_power {
        parts.push(format_watts(snapshot.power_watts));
    }
    if display.show_temp {
        parts.push(format_temp(snapshot.combined_temp_c));
    }
    parts.join(" | ")
}

/// Status line for the most recent snapshot in `history`, if any.
pub fn history_line(history: &SnapshotHistory, display: &DisplayConfig) -> Option<String> {
    history
        .latest()
        .map(|snapshot| status_line(snapshot, display, Some(history)))
}
