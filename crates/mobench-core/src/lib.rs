// Domain modules
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod metrics;
pub mod model;
pub mod session;

pub use config::{BenchmarkSettings, UploadConfig};
pub use device::DeviceIdentity;
pub use error::{MobenchError, Result};
pub use event::BenchmarkEvent;
pub use metrics::{
    epoch_ms, ram_usage_pct, render_thermal_zones, BatterySnapshot, InferenceOutcome, RunMetrics,
    TelemetryFrame, TelemetrySample, TelemetrySeries, ThermalZone,
};
pub use model::{extract_family, ModelSpec};
pub use session::{BenchmarkSession, SessionStatus};
