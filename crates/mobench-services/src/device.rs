use std::fs;
use std::sync::OnceLock;

use tracing::warn;

use mobench_benchmark::TelemetryProbe;
use mobench_core::{BatterySnapshot, DeviceIdentity, ThermalZone};

use crate::battery::PowerSupply;
use crate::memory;
use crate::store::ResultStore;
use crate::thermal::ThermalZones;

const DEVICE_ID_KEY: &str = "device_unique_id";

/// Probes for a human-readable device name; embedded boards expose the
/// devicetree model, everything else the DMI product name.
const MODEL_PROBES: &[&str] = &[
    "/sys/firmware/devicetree/base/model",
    "/sys/devices/virtual/dmi/id/product_name",
];

const BRAND_PROBES: &[&str] = &[
    "/sys/devices/virtual/dmi/id/sys_vendor",
    "/sys/devices/virtual/dmi/id/board_vendor",
];

/// Production telemetry sampler over procfs and sysfs.
#[derive(Debug, Clone, Default)]
pub struct SysfsTelemetry {
    power: PowerSupply,
    thermal: ThermalZones,
}

impl SysfsTelemetry {
    pub fn new(power: PowerSupply, thermal: ThermalZones) -> Self {
        Self { power, thermal }
    }
}

impl TelemetryProbe for SysfsTelemetry {
    fn memory_rss_mb(&self) -> Option<u64> {
        memory::vm_rss_mb()
    }

    fn battery_snapshot(&self) -> Option<BatterySnapshot> {
        self.power.snapshot()
    }

    fn thermal_zones(&self) -> Vec<ThermalZone> {
        self.thermal.zones()
    }

    fn battery_temperature_c(&self) -> Option<f32> {
        self.power.temperature_c()
    }

    fn battery_level(&self) -> Option<f32> {
        self.power.level()
    }

    fn total_memory_bytes(&self) -> Option<u64> {
        memory::total_memory_bytes()
    }
}

/// Stable per-install device id: read from the settings table, generated
/// and persisted on first use, cached for the life of the process.
pub fn install_id(store: &ResultStore) -> String {
    static ID: OnceLock<String> = OnceLock::new();
    ID.get_or_init(|| load_or_create_install_id(store)).clone()
}

fn load_or_create_install_id(store: &ResultStore) -> String {
    match store.get_setting(DEVICE_ID_KEY) {
        Ok(Some(id)) if !id.is_empty() => id,
        Ok(_) => {
            let id = uuid::Uuid::new_v4().to_string();
            if let Err(e) = store.set_setting(DEVICE_ID_KEY, &id) {
                warn!("could not persist device id: {}", e);
            }
            id
        }
        Err(e) => {
            warn!("could not read device id, using one-off fallback: {}", e);
            uuid::Uuid::new_v4().to_string()
        }
    }
}

pub fn device_identity(store: &ResultStore) -> DeviceIdentity {
    DeviceIdentity {
        device_id: install_id(store),
        model: device_model(),
        brand: device_brand(),
        system_name: system_name(),
        system_version: system_version(),
        total_memory_bytes: memory::total_memory_bytes().unwrap_or(0),
    }
}

pub fn device_model() -> String {
    first_string(MODEL_PROBES)
}

pub fn device_brand() -> String {
    first_string(BRAND_PROBES)
}

pub fn system_name() -> String {
    let os = std::env::consts::OS;
    let mut chars = os.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn system_version() -> String {
    fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn first_string(probes: &[&str]) -> String {
    probes
        .iter()
        .find_map(|path| {
            let raw = fs::read_to_string(path).ok()?;
            // devicetree strings are NUL-terminated
            let value = raw.trim_matches(char::from(0)).trim().to_string();
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_id_is_generated_once_and_persisted() {
        let store = ResultStore::in_memory().unwrap();
        let first = load_or_create_install_id(&store);
        assert!(!first.is_empty());

        let second = load_or_create_install_id(&store);
        assert_eq!(first, second);
        assert_eq!(store.get_setting("device_unique_id").unwrap(), Some(first));
    }

    #[test]
    fn existing_id_is_reused() {
        let store = ResultStore::in_memory().unwrap();
        store.set_setting("device_unique_id", "seeded-id").unwrap();
        assert_eq!(load_or_create_install_id(&store), "seeded-id");
    }

    #[test]
    fn system_name_is_capitalized() {
        let name = system_name();
        assert!(!name.is_empty());
        assert!(name.chars().next().unwrap().is_uppercase());
    }
}
