//! 采集网关进程的装配
//!
//! 把配置、持久缓冲区、中继任务和设备跟踪器连接起来，
//! 由 `riot-tracker` 二进制驱动。

pub mod app;
pub mod shutdown;

pub use app::{relay_settings, tracker_settings, App, Backend};
pub use shutdown::{ShutdownSignal, SignalHandler};
