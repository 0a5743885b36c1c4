use std::fs;
use std::path::{Path, PathBuf};

use mobench_core::ThermalZone;

/// Thermal zone reader over `/sys/class/thermal`.
#[derive(Debug, Clone)]
pub struct ThermalZones {
    root: PathBuf,
}

impl Default for ThermalZones {
    fn default() -> Self {
        Self::new("/sys/class/thermal")
    }
}

impl ThermalZones {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walks `thermal_zone0..` in order until the first missing zone.
    /// Zones reading zero are dropped; drivers report unavailable sensors
    /// that way.
    pub fn zones(&self) -> Vec<ThermalZone> {
        let mut zones = Vec::new();
        let mut index = 0;
        loop {
            let zone = self.root.join(format!("thermal_zone{index}"));
            let Some(label) = read_line(zone.join("type")) else {
                break;
            };
            if let Some(raw) = read_line(zone.join("temp")).and_then(|s| s.parse::<f32>().ok()) {
                if raw as i64 != 0 {
                    zones.push(ThermalZone {
                        label,
                        celsius: scale_raw(raw),
                    });
                }
            }
            index += 1;
        }
        zones
    }
}

/// Zone drivers disagree on units: millidegrees, centidegrees, or tenths.
/// Scale by magnitude until the value lands in a plausible °C range.
pub fn scale_raw(raw: f32) -> f32 {
    let magnitude = raw as i64;
    if magnitude > 10_000 {
        raw / 1000.0
    } else if magnitude > 1000 {
        raw / 100.0
    } else if magnitude > 100 {
        raw / 10.0
    } else {
        raw
    }
}

fn read_line(path: impl AsRef<Path>) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let line = text.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_zone(root: &Path, index: usize, label: &str, temp: &str) {
        let zone = root.join(format!("thermal_zone{index}"));
        fs::create_dir_all(&zone).unwrap();
        fs::write(zone.join("type"), format!("{label}\n")).unwrap();
        fs::write(zone.join("temp"), format!("{temp}\n")).unwrap();
    }

    #[test]
    fn scales_by_magnitude() {
        assert_eq!(scale_raw(42000.0), 42.0);
        assert_eq!(scale_raw(4200.0), 42.0);
        assert_eq!(scale_raw(420.0), 42.0);
        assert_eq!(scale_raw(42.0), 42.0);
    }

    #[test]
    fn walks_zones_in_order_and_skips_zero_readings() {
        let dir = TempDir::new().unwrap();
        write_zone(dir.path(), 0, "cpu-thermal", "45000");
        write_zone(dir.path(), 1, "gpu-thermal", "0");
        write_zone(dir.path(), 2, "battery", "310");

        let zones = ThermalZones::new(dir.path()).zones();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].label, "cpu-thermal");
        assert_eq!(zones[0].celsius, 45.0);
        assert_eq!(zones[1].label, "battery");
        assert_eq!(zones[1].celsius, 31.0);
    }

    #[test]
    fn stops_at_the_first_missing_zone() {
        let dir = TempDir::new().unwrap();
        write_zone(dir.path(), 0, "cpu-thermal", "45000");
        write_zone(dir.path(), 2, "unreachable", "45000");

        let zones = ThermalZones::new(dir.path()).zones();
        assert_eq!(zones.len(), 1);
    }

    #[test]
    fn empty_root_yields_no_zones() {
        let dir = TempDir::new().unwrap();
        assert!(ThermalZones::new(dir.path()).zones().is_empty());
    }
}
