use crate::error::RelayError;
use crate::transport::Transport;
use riot_storage::RecordBuffer;
use tracing::{debug, info, warn};

/// 一次排空的结果
#[derive(Debug)]
pub enum DrainOutcome {
    /// 缓冲区已清空
    Completed { delivered: u64 },
    /// 投递失败，剩余条目保持原样
    Interrupted { delivered: u64, error: RelayError },
    /// 读写缓冲区失败
    StorageFailed { delivered: u64, error: RelayError },
}

impl DrainOutcome {
    pub fn delivered(&self) -> u64 {
        match self {
            Self::Completed { delivered }
            | Self::Interrupted { delivered, .. }
            | Self::StorageFailed { delivered, .. } => *delivered,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// 缓冲区排空
///
/// 从最旧的条目开始逐条投递，确认成功后才删除；遇到第一次失败立即停止。
pub struct BufferDrain<'a> {
    buffer: &'a dyn RecordBuffer,
    transport: &'a dyn Transport,
}

impl<'a> BufferDrain<'a> {
    pub fn new(buffer: &'a dyn RecordBuffer, transport: &'a dyn Transport) -> Self {
        Self { buffer, transport }
    }

    pub async fn run(&self) -> DrainOutcome {
        let mut delivered = 0u64;
        info!(endpoint = %self.transport.endpoint(), "Buffer drain started");

        loop {
            let entry = match self.buffer.peek_oldest().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return DrainOutcome::StorageFailed {
                        delivered,
                        error: e.into(),
                    }
                }
            };

            if let Err(error) = self.transport.deliver(entry.record.as_bytes()).await {
                warn!(seq = entry.seq, delivered, error = %error, "Buffer drain interrupted");
                return DrainOutcome::Interrupted { delivered, error };
            }

            match self.buffer.remove_oldest(&entry).await {
                Ok(true) => {
                    delivered += 1;
                    debug!(seq = entry.seq, "Buffered record delivered");
                }
                Ok(false) => {
                    // 只有中继任务会删除条目，这里不应发生
                    warn!(seq = entry.seq, "Delivered entry was no longer the oldest");
                    delivered += 1;
                }
                Err(e) => {
                    return DrainOutcome::StorageFailed {
                        delivered,
                        error: e.into(),
                    }
                }
            }
        }

        info!(delivered, "Buffer drain finished");
        DrainOutcome::Completed { delivered }
    }
}
