use thiserror::Error;

/// 中继错误类型
#[derive(Error, Debug)]
pub enum RelayError {
    /// 连接端点失败
    #[error("Connect to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// 写入失败
    #[error("Write to {endpoint} failed: {source}")]
    Write {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// 操作超时
    #[error("{operation} to {endpoint} timed out")]
    Timeout {
        operation: &'static str,
        endpoint: String,
    },

    /// 缓冲区错误
    #[error("Storage error: {0}")]
    Storage(#[from] riot_storage::StorageError),

    /// 中继任务已停止
    #[error("Relay queue is closed")]
    Closed,
}

/// 中继结果类型
pub type Result<T> = std::result::Result<T, RelayError>;
