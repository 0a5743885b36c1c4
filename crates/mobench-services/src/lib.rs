pub mod battery;
pub mod device;
pub mod memory;
pub mod store;
pub mod thermal;

pub use battery::PowerSupply;
pub use device::{device_identity, install_id, SysfsTelemetry};
pub use store::{ResultStore, StoreError, StoredBenchmark};
pub use thermal::ThermalZones;
