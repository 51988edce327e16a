pub mod device;
pub mod record;
pub mod status;

pub use device::DeviceAddress;
pub use record::{Record, RecordSink};
pub use status::{
    ChannelStatusReporter, SharedStatusReporter, StatusLevel, StatusReporter, StatusUpdate,
    TracingStatusReporter,
};
