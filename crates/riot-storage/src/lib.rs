//! 持久化记录缓冲区
//!
//! 中继不可达时，记录按提交顺序写入这里，链路恢复后从最旧的开始取出投递。

pub mod buffer;
pub mod db;
pub mod error;

pub use buffer::{BufferEntry, BufferStats, MemoryBuffer, RecordBuffer, SharedBuffer, SqliteBuffer};
pub use error::{Result, StorageError};
