use serde::{Deserialize, Serialize};

/// Stable identity of the device running the benchmark. `device_id` is the
/// persisted per-install id; the remaining fields are best-effort probes
/// with empty-string fallbacks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub model: String,
    pub brand: String,
    pub system_name: String,
    pub system_version: String,
    pub total_memory_bytes: u64,
}
