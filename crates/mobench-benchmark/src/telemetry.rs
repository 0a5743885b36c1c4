use mobench_core::{BatterySnapshot, TelemetryFrame, ThermalZone};

/// Point-in-time device readings consumed by the orchestrator and the
/// periodic collector. All reads are best-effort: a missing sensor or
/// unreadable file yields `None`/empty, never an error.
pub trait TelemetryProbe: Send + Sync {
    /// Resident set size of this process in MB.
    fn memory_rss_mb(&self) -> Option<u64>;

    fn battery_snapshot(&self) -> Option<BatterySnapshot>;

    /// Thermal zones in sysfs order.
    fn thermal_zones(&self) -> Vec<ThermalZone>;

    fn battery_temperature_c(&self) -> Option<f32>;

    /// Battery level as a 0..1 fraction.
    fn battery_level(&self) -> Option<f32>;

    fn total_memory_bytes(&self) -> Option<u64>;
}

/// Captures one full frame from the probe, used for the start/end
/// snapshots around an inference call.
pub fn capture_frame(probe: &dyn TelemetryProbe) -> TelemetryFrame {
    TelemetryFrame {
        rss_mb: probe.memory_rss_mb().unwrap_or(0),
        battery_temp_c: probe.battery_temperature_c(),
        thermals: probe.thermal_zones(),
        battery: probe.battery_snapshot(),
        battery_level: probe.battery_level(),
    }
}
