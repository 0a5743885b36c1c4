use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Result of one (run, input-size) generation. Immutable once produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceOutcome {
    pub text: String,
    pub generated_tokens: u32,
    pub inference_time_ms: u64,
    pub ttft_ms: u64,
    pub tokens_per_sec: f64,
    pub success: bool,
}

/// One point-in-time memory reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub at_ms: u64,
    pub rss_mb: u64,
}

impl TelemetrySample {
    pub fn now(rss_mb: u64) -> Self {
        Self {
            at_ms: epoch_ms(),
            rss_mb,
        }
    }
}

/// Ordered, append-only series of samples spanning one run. The first and
/// last elements are always the start/end snapshots, never sampler ticks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySeries(Vec<TelemetrySample>);

impl TelemetrySeries {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        self.0.push(sample);
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = TelemetrySample>) {
        self.0.extend(samples);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&TelemetrySample> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&TelemetrySample> {
        self.0.last()
    }

    pub fn rss_mb(&self) -> Vec<u64> {
        self.0.iter().map(|s| s.rss_mb).collect()
    }
}

/// Battery gauge reading. Every field past the capacity pair is optional;
/// absent sensors stay absent rather than erroring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatterySnapshot {
    pub battery_capacity_mah: f64,
    pub remaining_capacity_mah: f64,
    pub used_capacity_mah: f64,
    pub battery_percentage: f64,
    pub current_draw_ma: Option<f64>,
    pub is_charging: Option<bool>,
    pub energy_mwh: Option<f64>,
    pub current_avg_ma: Option<f64>,
    pub charge_counter_mah: Option<f64>,
    pub voltage_v: Option<f64>,
}

/// One named thermal zone reading in °C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalZone {
    pub label: String,
    pub celsius: f32,
}

/// Renders zones the way the upload schema carries them, one
/// "label: value" line per zone.
pub fn render_thermal_zones(zones: &[ThermalZone]) -> String {
    let mut out = String::new();
    for zone in zones {
        out.push_str(&zone.label);
        out.push_str(": ");
        out.push_str(&zone.celsius.to_string());
        out.push('\n');
    }
    out
}

/// Everything read in one telemetry pass around an inference call.
#[derive(Debug, Clone, Default)]
pub struct TelemetryFrame {
    pub rss_mb: u64,
    pub battery_temp_c: Option<f32>,
    pub thermals: Vec<ThermalZone>,
    pub battery: Option<BatterySnapshot>,
    /// Battery level as a 0..1 fraction.
    pub battery_level: Option<f32>,
}

/// Aggregate of one inference run, handed to the reporter then discarded.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub outcome: InferenceOutcome,
    pub series: TelemetrySeries,
    pub start: TelemetryFrame,
    pub end: TelemetryFrame,
    pub started_at_ms: u64,
    pub input_tokens: u32,
    pub start_ram_usage_pct: f64,
    pub end_ram_usage_pct: f64,
}

impl RunMetrics {
    pub fn stopped_at_ms(&self) -> u64 {
        self.started_at_ms + self.outcome.inference_time_ms
    }
}

/// RAM usage as a percentage of total device memory.
pub fn ram_usage_pct(used_mb: u64, total_bytes: u64) -> f64 {
    let total_mb = total_bytes as f64 / 1024.0 / 1024.0;
    if total_mb > 0.0 {
        used_mb as f64 / total_mb * 100.0
    } else {
        0.0
    }
}

pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_tracks_first_and_last() {
        let mut series = TelemetrySeries::new();
        series.push(TelemetrySample { at_ms: 1, rss_mb: 100 });
        series.extend([
            TelemetrySample { at_ms: 2, rss_mb: 150 },
            TelemetrySample { at_ms: 3, rss_mb: 140 },
        ]);
        series.push(TelemetrySample { at_ms: 4, rss_mb: 120 });

        assert_eq!(series.len(), 4);
        assert_eq!(series.first().unwrap().rss_mb, 100);
        assert_eq!(series.last().unwrap().rss_mb, 120);
        assert_eq!(series.rss_mb(), vec![100, 150, 140, 120]);
    }

    #[test]
    fn ram_pct_handles_missing_total() {
        assert_eq!(ram_usage_pct(512, 0), 0.0);
        let pct = ram_usage_pct(1024, 4 * 1024 * 1024 * 1024);
        assert!((pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn battery_snapshot_serializes_wire_field_names() {
        let snap = BatterySnapshot {
            battery_capacity_mah: 3000.0,
            remaining_capacity_mah: 1500.0,
            used_capacity_mah: 1500.0,
            battery_percentage: 50.0,
            is_charging: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["batteryCapacityMah"], 3000.0);
        assert_eq!(json["remainingCapacityMah"], 1500.0);
        assert_eq!(json["usedCapacityMah"], 1500.0);
        assert_eq!(json["batteryPercentage"], 50.0);
        assert_eq!(json["isCharging"], false);
        assert!(json["currentDrawMa"].is_null());
    }

    #[test]
    fn thermal_render_is_one_line_per_zone() {
        let zones = vec![
            ThermalZone { label: "cpu-thermal".into(), celsius: 42.5 },
            ThermalZone { label: "battery".into(), celsius: 31.0 },
        ];
        assert_eq!(render_thermal_zones(&zones), "cpu-thermal: 42.5\nbattery: 31\n");
    }
}
