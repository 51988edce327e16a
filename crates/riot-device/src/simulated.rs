use crate::error::{DeviceError, Result};
use crate::stack::{Connection, GattSession, LinkEvent, WirelessStack};
use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use riot_sensor::{FieldEncoding, SensorKind};
use riot_types::DeviceAddress;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

const EVENT_CAPACITY: usize = 32;

/// 模拟设备配置
#[derive(Debug, Clone)]
struct SimulatedDevice {
    service: String,
    kind: Option<SensorKind>,
    /// 下一帧的序号
    seq: Arc<AtomicU32>,
    failing_fields: HashSet<String>,
}

/// 进程内模拟无线栈
///
/// 连接立即成功，服务发现返回配置的服务，字段读取返回随机值；
/// 序号字段按设备递增。用于 `--simulate` 模式和测试。
#[derive(Default)]
pub struct SimulatedStack {
    devices: Mutex<HashMap<DeviceAddress, SimulatedDevice>>,
    connects: AtomicU64,
}

impl SimulatedStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个传感器设备，序号从 1 开始
    pub fn with_device(self, address: impl Into<DeviceAddress>, kind: SensorKind) -> Self {
        self.add_device(address.into(), kind.service_uuid().to_string(), Some(kind), 1);
        self
    }

    /// 添加一个首帧为预热帧（序号 0）的传感器设备
    pub fn with_warming_device(self, address: impl Into<DeviceAddress>, kind: SensorKind) -> Self {
        self.add_device(address.into(), kind.service_uuid().to_string(), Some(kind), 0);
        self
    }

    /// 添加一个只提供未知服务的设备
    pub fn with_unknown_device(self, address: impl Into<DeviceAddress>, service: &str) -> Self {
        self.add_device(address.into(), service.to_string(), None, 1);
        self
    }

    /// 让设备的某个字段读取总是失败
    pub fn fail_field(&self, address: &DeviceAddress, field_id: &str) {
        if let Ok(mut devices) = self.devices.lock() {
            if let Some(device) = devices.get_mut(address) {
                device.failing_fields.insert(field_id.to_lowercase());
            }
        }
    }

    /// 累计连接次数
    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    fn add_device(&self, address: DeviceAddress, service: String, kind: Option<SensorKind>, seq: u32) {
        if let Ok(mut devices) = self.devices.lock() {
            devices.insert(
                address,
                SimulatedDevice {
                    service,
                    kind,
                    seq: Arc::new(AtomicU32::new(seq)),
                    failing_fields: HashSet::new(),
                },
            );
        }
    }
}

#[async_trait]
impl WirelessStack for SimulatedStack {
    async fn connect(&self, address: &DeviceAddress) -> Result<Connection> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        let device = self
            .devices
            .lock()
            .map_err(|_| DeviceError::link("simulated stack poisoned"))?
            .get(address)
            .cloned();

        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        let first = match &device {
            Some(_) => LinkEvent::Connected,
            None => LinkEvent::ConnectFailed {
                reason: format!("device {} out of range", address),
            },
        };
        let _ = tx.send(first).await;

        let session = SimulatedSession {
            address: address.clone(),
            device,
            tx,
        };
        Ok(Connection::new(Box::new(session), rx))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

struct SimulatedSession {
    address: DeviceAddress,
    device: Option<SimulatedDevice>,
    tx: mpsc::Sender<LinkEvent>,
}

impl SimulatedSession {
    fn device(&self) -> Result<&SimulatedDevice> {
        self.device
            .as_ref()
            .ok_or_else(|| DeviceError::link(format!("{} not connected", self.address)))
    }

    async fn emit(&self, event: LinkEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| DeviceError::link("event receiver dropped"))
    }
}

/// 按字段编码生成一个值
fn generate_value(kind: SensorKind, field_id: &str, seq: &AtomicU32) -> Option<Bytes> {
    let spec = kind.field_spec(field_id)?;
    let mut rng = rand::thread_rng();
    let bytes = if spec.name == "seq" {
        seq.fetch_add(1, Ordering::SeqCst).to_le_bytes().to_vec()
    } else {
        match spec.encoding {
            FieldEncoding::UnsignedLe(width) => {
                let value: u64 = rng.gen_range(0..=1000);
                value.to_le_bytes()[..width.min(8)].to_vec()
            }
            FieldEncoding::SignedLe(width) => {
                let value: i64 = rng.gen_range(-2000..=2000);
                value.to_le_bytes()[..width.min(8)].to_vec()
            }
            FieldEncoding::Text => b"sim".to_vec(),
        }
    };
    Some(Bytes::from(bytes))
}

#[async_trait]
impl GattSession for SimulatedSession {
    async fn discover_services(&self) -> Result<()> {
        let services = vec![self.device()?.service.clone()];
        self.emit(LinkEvent::ServicesDiscovered(services)).await
    }

    async fn request_read(&self, field_id: &str) -> Result<()> {
        let device = self.device()?;
        let event = if device.failing_fields.contains(&field_id.to_lowercase()) {
            LinkEvent::ReadFailed {
                field: field_id.to_string(),
                reason: "simulated read failure".to_string(),
            }
        } else {
            let value = device
                .kind
                .and_then(|kind| generate_value(kind, field_id, &device.seq));
            match value {
                Some(value) => LinkEvent::FieldRead {
                    field: field_id.to_string(),
                    value,
                },
                None => LinkEvent::ReadFailed {
                    field: field_id.to_string(),
                    reason: "unknown characteristic".to_string(),
                },
            }
        };
        debug!(device = %self.address, field = %field_id, "Simulated read");
        self.emit(event).await
    }

    async fn disconnect(&self) -> Result<()> {
        self.emit(LinkEvent::Disconnected).await
    }
}
