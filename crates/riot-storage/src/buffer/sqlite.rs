use super::{BufferEntry, BufferStats, RecordBuffer};
use crate::db::{self, buffered_record};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use riot_types::Record;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder,
};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// SQLite 缓冲区
///
/// 表结构与传感器类型无关，每行保存一条已序列化的记录，进程重启后仍然保留。
pub struct SqliteBuffer {
    db: DatabaseConnection,
    appended: AtomicU64,
    removed: AtomicU64,
}

impl SqliteBuffer {
    /// 连接数据库并建表
    ///
    /// 文件型 URL 的父目录不存在时会先创建。
    pub async fn connect(database_url: &str) -> Result<Self> {
        if let Some(path) = sqlite_file_path(database_url) {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        let db = Database::connect(database_url).await?;
        let buffer = Self::from_connection(db).await?;
        info!(url = %database_url, "Record buffer opened");
        Ok(buffer)
    }

    /// 使用已有连接
    pub async fn from_connection(db: DatabaseConnection) -> Result<Self> {
        db::ensure_schema(&db).await?;
        Ok(Self {
            db,
            appended: AtomicU64::new(0),
            removed: AtomicU64::new(0),
        })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// 从 `sqlite://path?mode=rwc` 中取出文件路径，内存库返回 `None`
fn sqlite_file_path(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(path)
    }
}

#[async_trait]
impl RecordBuffer for SqliteBuffer {
    async fn append(&self, record: &Record) -> Result<i64> {
        let model = buffered_record::ActiveModel {
            id: NotSet,
            line: Set(record.as_str().to_string()),
            created_at: Set(Utc::now()),
        };
        let saved = model.insert(&self.db).await?;
        self.appended.fetch_add(1, Ordering::Relaxed);
        debug!(seq = saved.id, "Record buffered");
        Ok(saved.id)
    }

    async fn peek_oldest(&self) -> Result<Option<BufferEntry>> {
        let oldest = buffered_record::Entity::find()
            .order_by_asc(buffered_record::Column::Id)
            .one(&self.db)
            .await?;
        Ok(oldest.map(|m| BufferEntry {
            seq: m.id,
            record: Record::from_line(m.line),
        }))
    }

    async fn remove_oldest(&self, entry: &BufferEntry) -> Result<bool> {
        match self.peek_oldest().await? {
            Some(oldest) if oldest.seq == entry.seq => {}
            _ => return Ok(false),
        }

        let result = buffered_record::Entity::delete_by_id(entry.seq)
            .exec(&self.db)
            .await?;
        let removed = result.rows_affected == 1;
        if removed {
            self.removed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        let count = buffered_record::Entity::find().count(&self.db).await?;
        Ok(count)
    }

    fn backend_type(&self) -> &str {
        "sqlite"
    }

    fn stats(&self) -> BufferStats {
        BufferStats {
            appended: self.appended.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(
            sqlite_file_path("sqlite://./data/riot-buffer.db?mode=rwc"),
            Some("./data/riot-buffer.db")
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn test_in_memory_buffer_roundtrip() {
        let buffer = SqliteBuffer::connect("sqlite::memory:").await.unwrap();
        assert_eq!(buffer.backend_type(), "sqlite");
        assert!(buffer.peek_oldest().await.unwrap().is_none());

        buffer.append(&Record::from_line("lux 0x00 1 1 10\n")).await.unwrap();
        let entry = buffer.peek_oldest().await.unwrap().unwrap();
        assert_eq!(entry.record.as_str(), "lux 0x00 1 1 10\n");
        assert!(buffer.remove_oldest(&entry).await.unwrap());
        assert_eq!(buffer.count().await.unwrap(), 0);
    }
}
