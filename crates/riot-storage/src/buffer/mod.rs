use crate::error::Result;
use async_trait::async_trait;
use riot_types::Record;
use std::sync::Arc;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryBuffer;
pub use sqlite::SqliteBuffer;

/// 缓冲区中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEntry {
    /// 插入序号，严格递增
    pub seq: i64,
    pub record: Record,
}

/// 缓冲区统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// 累计写入条数
    pub appended: u64,
    /// 累计确认投递后删除的条数
    pub removed: u64,
}

/// 持久化 FIFO 缓冲区抽象
///
/// 只保证插入顺序；条目写入后不会被修改，只有确认投递后才会删除。
#[async_trait]
pub trait RecordBuffer: Send + Sync {
    /// 追加记录，返回插入序号
    async fn append(&self, record: &Record) -> Result<i64>;

    /// 查看最旧的一条，不删除
    async fn peek_oldest(&self) -> Result<Option<BufferEntry>>;

    /// 删除最旧的一条
    ///
    /// 只有当 `entry` 仍是最旧条目时才删除，返回是否删除。
    async fn remove_oldest(&self, entry: &BufferEntry) -> Result<bool>;

    /// 当前条目数
    async fn count(&self) -> Result<u64>;

    /// 后端类型
    fn backend_type(&self) -> &str;

    /// 统计信息
    fn stats(&self) -> BufferStats {
        BufferStats::default()
    }
}

pub type SharedBuffer = Arc<dyn RecordBuffer>;
