use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use riot_types::DeviceAddress;
use tokio::sync::mpsc;

/// 无线栈上报的链路事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// 链路建立
    Connected,
    /// 连接失败
    ConnectFailed { reason: String },
    /// 链路关闭（主动断开或意外掉线）
    Disconnected,
    /// 服务发现完成
    ServicesDiscovered(Vec<String>),
    /// 特征读取完成
    FieldRead { field: String, value: Bytes },
    /// 特征读取失败
    ReadFailed { field: String, reason: String },
}

/// 一条已发起的 GATT 连接
///
/// 请求方法只负责发出请求，结果通过 [`Connection::events`] 异步返回。
#[async_trait]
pub trait GattSession: Send + Sync {
    /// 发起服务发现
    async fn discover_services(&self) -> Result<()>;

    /// 请求读取一个特征
    async fn request_read(&self, field_id: &str) -> Result<()>;

    /// 断开连接
    async fn disconnect(&self) -> Result<()>;
}

/// 连接句柄：请求接口加事件流
pub struct Connection {
    pub session: Box<dyn GattSession>,
    pub events: mpsc::Receiver<LinkEvent>,
}

impl Connection {
    pub fn new(session: Box<dyn GattSession>, events: mpsc::Receiver<LinkEvent>) -> Self {
        Self { session, events }
    }
}

/// 无线栈抽象
///
/// 实际的蓝牙栈不在本仓库内，这里只定义调度器需要的最小接口。
#[async_trait]
pub trait WirelessStack: Send + Sync {
    /// 向设备发起连接
    ///
    /// 返回后链路结果以 `Connected` 或 `ConnectFailed` 事件送达。
    async fn connect(&self, address: &DeviceAddress) -> Result<Connection>;

    /// 栈名称，用于日志
    fn name(&self) -> &str;
}
