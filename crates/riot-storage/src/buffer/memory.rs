use super::{BufferEntry, BufferStats, RecordBuffer};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use riot_types::Record;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::Mutex;

/// 内存缓冲区
///
/// 进程退出即丢失，只用于测试。
/// 可以注入写入失败，用来验证上层的重试逻辑。
pub struct MemoryBuffer {
    inner: Mutex<Inner>,
    failing_appends: AtomicU32,
    appended: AtomicU64,
    removed: AtomicU64,
}

struct Inner {
    entries: VecDeque<BufferEntry>,
    next_seq: i64,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                next_seq: 1,
            }),
            failing_appends: AtomicU32::new(0),
            appended: AtomicU64::new(0),
            removed: AtomicU64::new(0),
        }
    }

    /// 让接下来的 `n` 次 append 失败
    pub fn fail_next_appends(&self, n: u32) {
        self.failing_appends.store(n, Ordering::SeqCst);
    }

    /// 按顺序返回当前所有记录
    pub async fn snapshot(&self) -> Vec<Record> {
        let inner = self.inner.lock().await;
        inner.entries.iter().map(|e| e.record.clone()).collect()
    }
}

impl Default for MemoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordBuffer for MemoryBuffer {
    async fn append(&self, record: &Record) -> Result<i64> {
        let injected = self
            .failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StorageError::Unavailable("injected append failure".to_string()));
        }

        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push_back(BufferEntry {
            seq,
            record: record.clone(),
        });
        self.appended.fetch_add(1, Ordering::Relaxed);
        Ok(seq)
    }

    async fn peek_oldest(&self) -> Result<Option<BufferEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.entries.front().cloned())
    }

    async fn remove_oldest(&self, entry: &BufferEntry) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.entries.front() {
            Some(front) if front.seq == entry.seq => {
                inner.entries.pop_front();
                self.removed.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count(&self) -> Result<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.entries.len() as u64)
    }

    fn backend_type(&self) -> &str {
        "memory"
    }

    fn stats(&self) -> BufferStats {
        BufferStats {
            appended: self.appended.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }
}
