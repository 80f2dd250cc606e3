//! Power analytics report: window statistics, a chart series and an
//! electricity cost estimate.

use std::fmt::Write;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::config::ReportSection;
use crate::error::StoreError;
use crate::store::{MetricsStore, Stats};

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;
const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
    All,
}

impl Period {
    pub fn stats_window(self) -> Duration {
        Duration::from_secs(match self {
            Period::Day => DAY,
            Period::Week => 7 * DAY,
            Period::Month => 30 * DAY,
            Period::All => 365 * DAY,
        })
    }

    pub fn title(self) -> &'static str {
        match self {
            Period::Day => "24 Hours",
            Period::Week => "7 Days",
            Period::Month => "30 Days",
            Period::All => "All Time",
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "24h" | "day" => Ok(Period::Day),
            "7d" | "week" => Ok(Period::Week),
            "30d" | "month" => Ok(Period::Month),
            "all" => Ok(Period::All),
            other => Err(format!("unknown period `{other}` (expected 24h, 7d, 30d or all)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pricing {
    pub rate_per_kwh: f64,
    pub currency: String,
    pub symbol: String,
}

impl From<&ReportSection> for Pricing {
    fn from(section: &ReportSection) -> Self {
        Pricing {
            rate_per_kwh: section.rate_per_kwh,
            currency: section.currency.clone(),
            symbol: section.currency_symbol.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub avg_power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub period: Period,
    pub stats: Stats,
    pub chart: Vec<ChartPoint>,
    pub pricing: Pricing,
    pub estimated_cost: f64,
}

impl Report {
    pub fn new(period: Period, stats: Stats, chart: Vec<ChartPoint>, pricing: Pricing) -> Self {
        let estimated_cost = stats.total_energy_kwh * pricing.rate_per_kwh;
        Report {
            period,
            stats,
            chart,
            pricing,
            estimated_cost,
        }
    }

    /// Query the store for `period`. The 24h view charts hours, the others days.
    pub fn build(store: &MetricsStore, period: Period, pricing: Pricing) -> Result<Self, StoreError> {
        let stats = store.summarize(period.stats_window())?;
        let chart = match period {
            Period::Day => store
                .hourly_average(period.stats_window())?
                .into_iter()
                .map(|bucket| ChartPoint {
                    label: bucket.hour.format("%Hh").to_string(),
                    avg_power: bucket.avg_power,
                })
                .collect(),
            Period::Week | Period::Month | Period::All => {
                let days = match period {
                    Period::Week => 7,
                    Period::Month => 30,
                    _ => 90,
                };
                store
                    .daily_average(days)?
                    .into_iter()
                    .map(|bucket| ChartPoint {
                        label: bucket.day.format("%m-%d").to_string(),
                        avg_power: bucket.avg_power,
                    })
                    .collect()
            }
        };
        Ok(Report::new(period, stats, chart, pricing))
    }

    pub fn render(&self) -> String {
        let stats = &self.stats;
        let mut out = String::new();
        let _ = writeln!(out, "Power consumption ({})", self.period.title());
        let _ = writeln!(out, "  Total kWh:  {:.2} kWh", stats.total_energy_kwh);
        let _ = writeln!(out, "  Average:    {:.1} W", stats.avg_power);
        let _ = writeln!(out, "  Max:        {:.1} W", stats.max_power);
        let _ = writeln!(out, "  Min:        {:.1} W", stats.min_power);
        let _ = writeln!(out, "  Duration:   {:.1} hours", stats.window_hours);
        let _ = writeln!(out, "  Readings:   {}", stats.count);
        let _ = writeln!(
            out,
            "  Cost:       {}{:.2} at {:.2} {}/kWh",
            self.pricing.symbol, self.estimated_cost, self.pricing.rate_per_kwh, self.pricing.currency
        );

        if self.chart.is_empty() {
            let _ = write!(out, "\nNo readings in this period.");
            return out;
        }

        let _ = writeln!(out, "\nPower over time");
        let peak = self.chart.iter().map(|p| p.avg_power).fold(0.0, f64::max);
        let label_width = self.chart.iter().map(|p| p.label.len()).max().unwrap_or(0);
        for point in &self.chart {
            let filled = if peak > 0.0 {
                ((point.avg_power / peak) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            let _ = writeln!(
                out,
                "  {:<label_width$}  {:<BAR_WIDTH$}  {:.1} W",
                point.label,
                "█".repeat(filled.min(BAR_WIDTH)),
                point.avg_power,
            );
        }
        out.truncate(out.trim_end().len());
        out
    }
}
