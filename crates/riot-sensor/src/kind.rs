use crate::error::{Result, SensorError};
use crate::field::{FieldEncoding, FieldSpec, FieldValue, FieldValues};
use crate::uuids;
use riot_types::Record;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::debug;

const LUX_SEQ: FieldSpec = FieldSpec::new(uuids::LUX_SEQUENCE, "seq", FieldEncoding::UnsignedLe(4));
const LUX_VALUE: FieldSpec = FieldSpec::new(uuids::LUX_VALUE, "value", FieldEncoding::UnsignedLe(4));

/// lux 先读序号再读数值，记录里数值在前
const LUX_READ_ORDER: [FieldSpec; 2] = [LUX_SEQ, LUX_VALUE];
const LUX_RECORD_ORDER: [FieldSpec; 2] = [LUX_VALUE, LUX_SEQ];

const MOTION_FIELDS: [FieldSpec; 10] = [
    FieldSpec::new(uuids::MOTION_SEQUENCE, "seq", FieldEncoding::UnsignedLe(4)),
    FieldSpec::new(uuids::MOTION_GYRO_X, "gx", FieldEncoding::SignedLe(2)),
    FieldSpec::new(uuids::MOTION_GYRO_Y, "gy", FieldEncoding::SignedLe(2)),
    FieldSpec::new(uuids::MOTION_GYRO_Z, "gz", FieldEncoding::SignedLe(2)),
    FieldSpec::new(uuids::MOTION_ACCEL_X, "ax", FieldEncoding::SignedLe(2)),
    FieldSpec::new(uuids::MOTION_ACCEL_Y, "ay", FieldEncoding::SignedLe(2)),
    FieldSpec::new(uuids::MOTION_ACCEL_Z, "az", FieldEncoding::SignedLe(2)),
    FieldSpec::new(uuids::MOTION_MAG_X, "mx", FieldEncoding::SignedLe(2)),
    FieldSpec::new(uuids::MOTION_MAG_Y, "my", FieldEncoding::SignedLe(2)),
    FieldSpec::new(uuids::MOTION_MAG_Z, "mz", FieldEncoding::SignedLe(2)),
];

/// 传感器类型
///
/// 每个变体对应一种固件，由发现到的 GATT 服务 UUID 识别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// 光照传感器
    Lux,
    /// 九轴运动传感器
    Motion,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [SensorKind::Lux, SensorKind::Motion];

    /// 根据服务 UUID 识别传感器类型，UUID 比较不区分大小写
    pub fn identify(service_id: &str) -> Option<SensorKind> {
        let service_id = service_id.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.service_uuid().eq_ignore_ascii_case(service_id))
    }

    /// 从一组服务中找出第一个可识别的
    pub fn identify_any<S: AsRef<str>>(service_ids: &[S]) -> Option<SensorKind> {
        service_ids
            .iter()
            .find_map(|id| Self::identify(id.as_ref()))
    }

    pub fn service_uuid(&self) -> &'static str {
        match self {
            Self::Lux => uuids::LUX_SERVICE,
            Self::Motion => uuids::MOTION_SERVICE,
        }
    }

    /// 记录首列的类型标签
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Lux => "lux",
            Self::Motion => "motion",
        }
    }

    /// 设备类别编号，记录第二列
    pub fn class_id(&self) -> &'static str {
        match self {
            Self::Lux => "0x00",
            Self::Motion => "0x01",
        }
    }

    /// 字段描述，按读取顺序
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::Lux => &LUX_READ_ORDER,
            Self::Motion => &MOTION_FIELDS,
        }
    }

    /// 需要读取的特征 UUID，顺序即向无线栈发出请求的顺序
    pub fn fields_to_read(&self) -> Vec<&'static str> {
        self.fields().iter().map(|f| f.id).collect()
    }

    /// 字段在记录中的顺序
    pub fn record_order(&self) -> &'static [FieldSpec] {
        match self {
            Self::Lux => &LUX_RECORD_ORDER,
            Self::Motion => &MOTION_FIELDS,
        }
    }

    pub fn field_spec(&self, field_id: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.matches(field_id))
    }

    /// 解码一个字段；未知字段返回 `None`
    pub fn decode(&self, field_id: &str, raw: &[u8]) -> Result<Option<FieldValue>> {
        match self.field_spec(field_id) {
            Some(spec) => spec.decode(raw).map(Some),
            None => Ok(None),
        }
    }

    /// 解码并存入值表；未知字段不做任何事，返回 `false`
    pub fn store(&self, values: &mut FieldValues, field_id: &str, raw: &[u8]) -> Result<bool> {
        let Some(spec) = self.field_spec(field_id) else {
            debug!(sensor = self.tag(), field = %field_id, "Ignoring unknown field");
            return Ok(false);
        };
        let value = spec.decode(raw)?;
        values.insert(spec, value);
        Ok(true)
    }

    /// 所有字段都已有值
    pub fn is_read_complete(&self, values: &FieldValues) -> bool {
        self.fields().iter().all(|f| values.contains(f))
    }

    /// 没有进行中的读取周期
    pub fn is_read_idle(&self, values: &FieldValues) -> bool {
        values.is_empty()
    }

    /// 设备上电后的预热帧：序号为 0
    pub fn is_warmup(&self, values: &FieldValues) -> bool {
        match self {
            Self::Lux => values.get(&LUX_SEQ).and_then(FieldValue::as_u64) == Some(0),
            Self::Motion => false,
        }
    }

    /// 序列化为一行记录
    ///
    /// 格式：`<tag> <class-id> <字段...> <timestamp>\n`，字段按记录顺序。
    pub fn serialize(&self, values: &FieldValues, timestamp: i64) -> Result<Record> {
        let mut line = String::with_capacity(64);
        line.push_str(self.tag());
        line.push(' ');
        line.push_str(self.class_id());
        for spec in self.record_order() {
            let value = values.get(spec).ok_or(SensorError::Incomplete {
                sensor: self.tag(),
                missing: spec.name,
            })?;
            // 写入 String 不会失败
            let _ = write!(line, " {}", value);
        }
        let _ = writeln!(line, " {}", timestamp);
        Ok(Record::from_line(line))
    }

    /// 清空值表，可重复调用
    pub fn reset(&self, values: &mut FieldValues) {
        values.clear();
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lux_values(seq: u32, value: u32) -> FieldValues {
        let mut values = FieldValues::new();
        let kind = SensorKind::Lux;
        kind.store(&mut values, uuids::LUX_SEQUENCE, &seq.to_le_bytes())
            .unwrap();
        kind.store(&mut values, uuids::LUX_VALUE, &value.to_le_bytes())
            .unwrap();
        values
    }

    #[test]
    fn test_identify_ignores_case() {
        assert_eq!(
            SensorKind::identify(&uuids::LUX_SERVICE.to_uppercase()),
            Some(SensorKind::Lux)
        );
        assert_eq!(SensorKind::identify(uuids::MOTION_SERVICE), Some(SensorKind::Motion));
        assert_eq!(SensorKind::identify("0000180f-0000-1000-8000-00805f9b34fb"), None);
    }

    #[test]
    fn test_identify_any_skips_unknown_services() {
        let services = vec![
            "00001800-0000-1000-8000-00805f9b34fb".to_string(),
            uuids::MOTION_SERVICE.to_string(),
        ];
        assert_eq!(SensorKind::identify_any(&services), Some(SensorKind::Motion));
    }

    #[test]
    fn test_lux_read_order_differs_from_record_order() {
        let kind = SensorKind::Lux;
        assert_eq!(kind.fields_to_read(), vec![uuids::LUX_SEQUENCE, uuids::LUX_VALUE]);
        let record_names: Vec<_> = kind.record_order().iter().map(|f| f.name).collect();
        assert_eq!(record_names, vec!["value", "seq"]);
    }

    #[test]
    fn test_lux_record_puts_value_before_seq() {
        let kind = SensorKind::Lux;
        let mut values = lux_values(3, 42);
        assert!(kind.is_read_complete(&values));

        let record = kind.serialize(&values, 1_500_000_000).unwrap();
        assert_eq!(record.as_str(), "lux 0x00 42 3 1500000000\n");

        kind.reset(&mut values);
        assert!(kind.is_read_idle(&values));
        kind.reset(&mut values);
        assert!(values.is_empty());
    }

    #[test]
    fn test_serialize_incomplete_fails() {
        let kind = SensorKind::Lux;
        let mut values = FieldValues::new();
        kind.store(&mut values, uuids::LUX_SEQUENCE, &7u32.to_le_bytes())
            .unwrap();
        assert!(!kind.is_read_complete(&values));
        assert!(!kind.is_read_idle(&values));
        assert!(matches!(
            kind.serialize(&values, 1),
            Err(SensorError::Incomplete { missing: "value", .. })
        ));
    }

    #[test]
    fn test_unknown_field_is_noop() {
        let kind = SensorKind::Lux;
        let mut values = FieldValues::new();
        assert!(!kind.store(&mut values, "deadbeef", &[1, 2, 3, 4]).unwrap());
        assert!(values.is_empty());
        assert_eq!(kind.decode("deadbeef", &[1]).unwrap(), None);
    }

    #[test]
    fn test_motion_serialize_all_axes() {
        let kind = SensorKind::Motion;
        let mut values = FieldValues::new();
        kind.store(&mut values, uuids::MOTION_SEQUENCE, &9u32.to_le_bytes())
            .unwrap();
        for (i, spec) in kind.fields().iter().enumerate().skip(1) {
            let axis = -(i as i16) * 10;
            kind.store(&mut values, spec.id, &axis.to_le_bytes()).unwrap();
        }
        assert!(kind.is_read_complete(&values));

        let record = kind.serialize(&values, 42).unwrap();
        assert_eq!(
            record.as_str(),
            "motion 0x01 9 -10 -20 -30 -40 -50 -60 -70 -80 -90 42\n"
        );
    }

    #[test]
    fn test_warmup_frame_detection() {
        let kind = SensorKind::Lux;
        assert!(kind.is_warmup(&lux_values(0, 12)));
        assert!(!kind.is_warmup(&lux_values(1, 12)));
    }
}
