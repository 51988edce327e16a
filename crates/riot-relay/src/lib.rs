//! 存储转发中继
//!
//! 记录先尝试直接投递；失败后写入持久缓冲区并把链路置为 DOWN，
//! 由探测循环发现恢复，再按 FIFO 顺序排空缓冲区。
//! 链路状态只由一个后台任务修改。

pub mod access_point;
pub mod drain;
pub mod error;
pub mod link;
pub mod queue;
pub mod transport;

pub use access_point::{
    ensure_associated, AccessPoint, NullAccessPoint, SimulatedAccessPoint, SsidPattern,
};
pub use drain::{BufferDrain, DrainOutcome};
pub use error::{RelayError, Result};
pub use link::{LinkMonitor, LinkState};
pub use queue::{RelayHandle, RelayQueue, RelaySettings, RelayStats};
pub use transport::{TcpTransport, Transport};
