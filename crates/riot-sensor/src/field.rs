use crate::error::{Result, SensorError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 字段的字节编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// 小端无符号整数，参数为字节数（1..=8）
    UnsignedLe(usize),
    /// 小端有符号整数，参数为字节数（1..=8）
    SignedLe(usize),
    /// 原样透传的 UTF-8 文本
    Text,
}

/// 解码后的字段值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            Self::Signed(v) => u64::try_from(*v).ok(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "{}", v),
            Self::Signed(v) => write!(f, "{}", v),
            // 记录以空格分隔，文本里的空白统一替换掉，空文本占位为 "-"
            Self::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .map(|c| if c.is_whitespace() { '_' } else { c })
                    .collect();
                if cleaned.is_empty() {
                    f.write_str("-")
                } else {
                    f.write_str(&cleaned)
                }
            }
        }
    }
}

/// 单个字段的静态描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// 特征 UUID（小写）
    pub id: &'static str,
    /// 短名，用于日志
    pub name: &'static str,
    pub encoding: FieldEncoding,
}

impl FieldSpec {
    pub const fn new(id: &'static str, name: &'static str, encoding: FieldEncoding) -> Self {
        Self { id, name, encoding }
    }

    pub fn matches(&self, field_id: &str) -> bool {
        self.id.eq_ignore_ascii_case(field_id.trim())
    }

    /// 按编码解释原始字节
    ///
    /// 整数字段只取前 N 个字节，多余的字节忽略。
    pub fn decode(&self, raw: &[u8]) -> Result<FieldValue> {
        match self.encoding {
            FieldEncoding::UnsignedLe(width) => {
                let width = width.clamp(1, 8);
                let bytes = self.take(raw, width)?;
                let value = bytes
                    .iter()
                    .rev()
                    .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
                Ok(FieldValue::Unsigned(value))
            }
            FieldEncoding::SignedLe(width) => {
                let width = width.clamp(1, 8);
                let bytes = self.take(raw, width)?;
                let value = bytes
                    .iter()
                    .rev()
                    .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
                let shift = 64 - (width as u32) * 8;
                // 符号扩展
                let signed = ((value << shift) as i64) >> shift;
                Ok(FieldValue::Signed(signed))
            }
            FieldEncoding::Text => std::str::from_utf8(raw)
                .map(|s| FieldValue::Text(s.trim_end_matches('\0').to_string()))
                .map_err(|_| SensorError::InvalidText { field: self.name }),
        }
    }

    fn take<'a>(&self, raw: &'a [u8], width: usize) -> Result<&'a [u8]> {
        if raw.len() < width {
            return Err(SensorError::ShortValue {
                field: self.name,
                expected: width,
                actual: raw.len(),
            });
        }
        Ok(&raw[..width])
    }
}

/// 一个读取周期内累积的字段值
///
/// 以特征 UUID 为键；每次发出记录或中止周期后清空。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    values: HashMap<&'static str, FieldValue>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spec: &FieldSpec, value: FieldValue) {
        self.values.insert(spec.id, value);
    }

    pub fn get(&self, spec: &FieldSpec) -> Option<&FieldValue> {
        self.values.get(spec.id)
    }

    pub fn contains(&self, spec: &FieldSpec) -> bool {
        self.values.contains_key(spec.id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
