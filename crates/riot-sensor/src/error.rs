use thiserror::Error;

/// 传感器数据错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// 原始字节不足
    #[error("Field {field} expects {expected} bytes, got {actual}")]
    ShortValue {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// 文本字段不是合法 UTF-8
    #[error("Field {field} is not valid UTF-8")]
    InvalidText { field: &'static str },

    /// 字段未读齐，不能序列化
    #[error("Reading for {sensor} is incomplete, missing {missing}")]
    Incomplete {
        sensor: &'static str,
        missing: &'static str,
    },
}

/// 传感器结果类型
pub type Result<T> = std::result::Result<T, SensorError>;
