use thiserror::Error;

/// 缓冲区存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 存储暂时不可用
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// 存储结果类型
pub type Result<T> = std::result::Result<T, StorageError>;
