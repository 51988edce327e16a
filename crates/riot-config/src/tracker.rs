use riot_types::DeviceAddress;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 采集网关配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub relay: RelayConfig,
    pub buffer: BufferConfig,
    pub scheduler: SchedulerConfig,
    pub access_point: AccessPointConfig,
    pub devices: Vec<DeviceEntry>,
}

impl TrackerConfig {
    /// 序列化为 TOML，便于打印生效的配置
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// 采集端点
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// 链路断开时的探测间隔
    pub probe_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "192.168.4.1".to_string(),
            port: 5000,
            connect_timeout_ms: 3000,
            write_timeout_ms: 3000,
            probe_interval_ms: 1000,
        }
    }
}

impl RelayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

/// 持久缓冲区
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    pub database_url: String,
    pub write_retry_attempts: u32,
    pub write_retry_delay_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/riot-buffer.db?mode=rwc".to_string(),
            write_retry_attempts: 5,
            write_retry_delay_ms: 200,
        }
    }
}

impl BufferConfig {
    pub fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }
}

/// 读取调度
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub poll_interval_ms: u64,
    pub discovery_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub reconnect_backoff_initial_ms: u64,
    pub reconnect_backoff_max_ms: u64,
    pub skip_warmup_frames: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            discovery_timeout_ms: 10000,
            read_timeout_ms: 5000,
            reconnect_backoff_initial_ms: 1000,
            reconnect_backoff_max_ms: 30000,
            skip_warmup_frames: true,
        }
    }
}

/// 网关热点
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessPointConfig {
    pub ssid_pattern: String,
    pub associate_on_start: bool,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid_pattern: "riot-waikato-*".to_string(),
            associate_on_start: true,
        }
    }
}

/// 要跟踪的设备
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceEntry {
    pub address: DeviceAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
