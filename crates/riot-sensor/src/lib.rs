//! 传感器模型
//!
//! 每种传感器是 [`SensorKind`] 的一个变体，变体自己声明服务 UUID、
//! 字段读取顺序、字节解码方式和记录序列化格式。读取调度器只依赖这些方法，
//! 新增传感器类型不需要修改调度逻辑。

pub mod error;
pub mod field;
pub mod kind;
pub mod uuids;

pub use error::{Result, SensorError};
pub use field::{FieldEncoding, FieldSpec, FieldValue, FieldValues};
pub use kind::SensorKind;
