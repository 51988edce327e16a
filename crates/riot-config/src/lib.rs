pub mod loader;
pub mod tracker;

pub use loader::ConfigLoader;
pub use tracker::{
    AccessPointConfig, BufferConfig, DeviceEntry, RelayConfig, SchedulerConfig, TrackerConfig,
};
