use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// 状态级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Ok,
    Warning,
    Error,
}

impl StatusLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// 粗粒度状态上报接口
///
/// 核心只调用它，界面层（不在本仓库内）负责展示。
pub trait StatusReporter: Send + Sync {
    fn report_status(&self, level: StatusLevel, message: &str);
}

pub type SharedStatusReporter = Arc<dyn StatusReporter>;

/// 把状态写进日志的上报器
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusReporter;

impl StatusReporter for TracingStatusReporter {
    fn report_status(&self, level: StatusLevel, message: &str) {
        match level {
            StatusLevel::Ok => info!(status = %message, "Status update"),
            StatusLevel::Warning => warn!(status = %message, "Status update"),
            StatusLevel::Error => error!(status = %message, "Status update"),
        }
    }
}

/// 一条状态消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub level: StatusLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// 通过 channel 转发状态的上报器
#[derive(Debug, Clone)]
pub struct ChannelStatusReporter {
    tx: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelStatusReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusReporter for ChannelStatusReporter {
    fn report_status(&self, level: StatusLevel, message: &str) {
        let update = StatusUpdate {
            level,
            message: message.to_string(),
            timestamp: Utc::now(),
        };
        // 接收端已关闭时静默丢弃
        let _ = self.tx.send(update);
    }
}
