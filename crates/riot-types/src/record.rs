use serde::{Deserialize, Serialize};
use std::fmt;

/// 序列化后的传感器记录
///
/// 一行以空格分隔的 ASCII 文本，以换行结尾。创建后不可变，
/// 中继层只把它当作不透明的字节块处理。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    line: String,
}

impl Record {
    /// 从已经序列化好的一行构造记录（缓冲区恢复时使用）
    pub fn from_line(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// 去掉行尾换行，用于日志输出
    pub fn trimmed(&self) -> &str {
        self.line.trim_end_matches(['\r', '\n'])
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trimmed())
    }
}

/// 记录接收端
///
/// 读取调度器把完成的记录交给它；实现必须立即返回，不能阻塞调用方。
pub trait RecordSink: Send + Sync {
    fn submit(&self, record: Record);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_bytes_and_display() {
        let record = Record::from_line("lux 0x00 42 3 1500000000\n");
        assert_eq!(record.as_bytes(), b"lux 0x00 42 3 1500000000\n");
        assert_eq!(record.to_string(), "lux 0x00 42 3 1500000000");
        assert_eq!(record.len(), 25);
    }
}
