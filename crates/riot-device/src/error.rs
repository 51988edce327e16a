use riot_types::DeviceAddress;
use thiserror::Error;

/// 设备跟踪错误类型
#[derive(Error, Debug)]
pub enum DeviceError {
    /// 设备已在跟踪中
    #[error("Device already tracked: {0}")]
    AlreadyTracked(DeviceAddress),

    /// 设备未被跟踪
    #[error("Device not tracked: {0}")]
    NotTracked(DeviceAddress),

    /// 读取周期进行中，拒绝重复连接
    #[error("Device {address} is busy ({state})")]
    Busy {
        address: DeviceAddress,
        state: String,
    },

    /// 无线链路错误
    #[error("Link error: {0}")]
    Link(String),

    /// 管理器已关闭
    #[error("Tracker manager is shut down")]
    ShutDown,
}

impl DeviceError {
    pub fn link(msg: impl Into<String>) -> Self {
        DeviceError::Link(msg.into())
    }
}

/// 设备跟踪结果类型
pub type Result<T> = std::result::Result<T, DeviceError>;
