use std::fs;
use std::path::{Path, PathBuf};

use mobench_core::BatterySnapshot;

/// Design-capacity probes in priority order; first hit wins. Vendor
/// gauges expose the value under different names.
const DESIGN_CAPACITY_PROBES: &[&str] = &[
    "battery/charge_full_design",
    "battery/design_capacity",
    "battery/power_supply/battery/charge_full_design",
    "max170xx_battery/charge_full_design",
];

/// Remaining-capacity probes in priority order.
const REMAINING_CAPACITY_PROBES: &[&str] = &[
    "battery/charge_now",
    "battery/capacity_now",
    "battery/batt_current_capacity",
    "battery/fg_current_capacity",
    "battery/current_capacity",
];

/// Conservative fallback when no probe yields a design capacity.
const DEFAULT_DESIGN_CAPACITY_MAH: f64 = 3000.0;

/// Battery gauge reader over the power-supply class tree.
#[derive(Debug, Clone)]
pub struct PowerSupply {
    root: PathBuf,
}

impl Default for PowerSupply {
    fn default() -> Self {
        Self::new("/sys/class/power_supply")
    }
}

impl PowerSupply {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Full gauge snapshot, or `None` when the device exposes no battery.
    pub fn snapshot(&self) -> Option<BatterySnapshot> {
        let battery = self.root.join("battery");
        if !battery.exists() {
            return None;
        }

        let battery_capacity_mah =
            first_probe(&self.root, DESIGN_CAPACITY_PROBES).unwrap_or(DEFAULT_DESIGN_CAPACITY_MAH);
        let mut remaining_capacity_mah =
            first_probe(&self.root, REMAINING_CAPACITY_PROBES).unwrap_or(0.0);

        let percentage =
            read_number(battery.join("capacity")).filter(|v| (0.0..=100.0).contains(v));
        let voltage_v = read_number(battery.join("voltage_now"))
            .filter(|v| *v > 0.0)
            .map(|uv| uv / 1_000_000.0);

        if remaining_capacity_mah <= 0.0 && battery_capacity_mah > 0.0 {
            remaining_capacity_mah = percentage.unwrap_or(0.0) / 100.0 * battery_capacity_mah;
        }

        let current_now = read_number(battery.join("current_now")).filter(|v| *v != 0.0);
        let current_draw_ma = current_now.map(|ua| (ua / 1000.0).abs());
        let is_charging = current_now.map(|ua| ua > 0.0);
        let current_avg_ma = read_number(battery.join("current_avg"))
            .filter(|v| *v != 0.0)
            .map(|ua| (ua / 1000.0).abs());
        let energy_mwh = read_number(battery.join("energy_now"))
            .filter(|v| *v > 0.0)
            .map(|uwh| uwh / 1000.0);

        // The fuel-gauge charge counter is the most precise remaining
        // reading available; when present it replaces the estimate.
        let charge_counter_mah = read_number(battery.join("charge_counter"))
            .map(scale_microunits)
            .filter(|v| *v > 0.0);
        if let Some(mah) = charge_counter_mah {
            remaining_capacity_mah = mah;
        }

        let used_capacity_mah = (battery_capacity_mah - remaining_capacity_mah.max(0.0)).max(0.0);

        Some(BatterySnapshot {
            battery_capacity_mah,
            remaining_capacity_mah,
            used_capacity_mah,
            battery_percentage: percentage.unwrap_or(0.0),
            current_draw_ma,
            is_charging,
            energy_mwh,
            current_avg_ma,
            charge_counter_mah,
            voltage_v,
        })
    }

    /// Battery level as a 0..1 fraction.
    pub fn level(&self) -> Option<f32> {
        read_number(self.root.join("battery/capacity"))
            .filter(|v| (0.0..=100.0).contains(v))
            .map(|pct| pct as f32 / 100.0)
    }

    /// Battery temperature in °C; the gauge reports tenths.
    pub fn temperature_c(&self) -> Option<f32> {
        read_number(self.root.join("battery/temp")).map(|tenths| tenths as f32 / 10.0)
    }
}

fn first_probe(root: &Path, probes: &[&str]) -> Option<f64> {
    probes
        .iter()
        .find_map(|rel| read_number(root.join(rel)).map(scale_microunits).filter(|v| *v > 0.0))
}

/// Gauges that report µAh rather than mAh come out three orders of
/// magnitude too large.
fn scale_microunits(value: f64) -> f64 {
    if value > 10_000_000.0 {
        value / 1000.0
    } else {
        value
    }
}

fn read_number(path: impl AsRef<Path>) -> Option<f64> {
    let text = fs::read_to_string(path).ok()?;
    text.trim().parse().ok()
}
