use anyhow::{Context, Result};
use riot_config::{SchedulerConfig, TrackerConfig};
use riot_device::{SimulatedStack, TrackerManager, TrackerSettings, WirelessStack};
use riot_relay::{
    ensure_associated, AccessPoint, RelayHandle, RelayQueue, RelaySettings, RelayStats,
    SimulatedAccessPoint, TcpTransport,
};
use riot_sensor::SensorKind;
use riot_storage::{SharedBuffer, SqliteBuffer};
use riot_types::{RecordSink, SharedStatusReporter, TracingStatusReporter};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 调度参数
pub fn tracker_settings(config: &SchedulerConfig) -> TrackerSettings {
    TrackerSettings {
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        discovery_timeout: Duration::from_millis(config.discovery_timeout_ms),
        read_timeout: Duration::from_millis(config.read_timeout_ms),
        backoff_initial: Duration::from_millis(config.reconnect_backoff_initial_ms),
        backoff_max: Duration::from_millis(config.reconnect_backoff_max_ms),
        skip_warmup: config.skip_warmup_frames,
    }
}

/// 中继参数
pub fn relay_settings(config: &TrackerConfig) -> RelaySettings {
    RelaySettings {
        probe_interval: config.relay.probe_interval(),
        write_retry_attempts: config.buffer.write_retry_attempts,
        write_retry_delay: config.buffer.write_retry_delay(),
    }
}

/// 硬件相关的部件：无线栈、接入点和状态上报
pub struct Backend {
    pub stack: Arc<dyn WirelessStack>,
    pub access_point: Arc<dyn AccessPoint>,
    pub reporter: SharedStatusReporter,
}

impl Backend {
    pub fn new(stack: Arc<dyn WirelessStack>, access_point: Arc<dyn AccessPoint>) -> Self {
        Self {
            stack,
            access_point,
            reporter: Arc::new(TracingStatusReporter),
        }
    }

    /// 模拟后端
    ///
    /// 配置里的设备依次轮换为各传感器类型，接入点只"看得到"一个匹配模式的热点。
    pub fn simulated(config: &TrackerConfig) -> Self {
        let mut stack = SimulatedStack::new();
        for (index, device) in config.devices.iter().enumerate() {
            let kind = SensorKind::ALL[index % SensorKind::ALL.len()];
            stack = stack.with_device(device.address.clone(), kind);
        }

        let pattern = &config.access_point.ssid_pattern;
        let ssid = match pattern.strip_suffix('*') {
            Some(prefix) => format!("{}01", prefix),
            None => pattern.clone(),
        };
        let access_point = SimulatedAccessPoint::new(pattern, vec![ssid]);

        Self::new(Arc::new(stack), Arc::new(access_point))
    }
}

/// 运行中的采集网关
pub struct App {
    manager: TrackerManager,
    relay: RelayHandle,
    relay_task: JoinHandle<()>,
}

impl App {
    /// 打开缓冲区、启动中继，再为每个配置的设备启动跟踪器
    pub async fn start(config: &TrackerConfig, backend: Backend) -> Result<Self> {
        let buffer: SharedBuffer = Arc::new(
            SqliteBuffer::connect(&config.buffer.database_url)
                .await
                .with_context(|| {
                    format!("Failed to open record buffer {}", config.buffer.database_url)
                })?,
        );

        if !ensure_associated(
            backend.access_point.as_ref(),
            config.access_point.associate_on_start,
        )
        .await
        {
            warn!(pattern = %config.access_point.ssid_pattern, "Starting without access point association");
        }

        let transport = Arc::new(
            TcpTransport::new(&config.relay.host, config.relay.port)
                .with_timeouts(config.relay.connect_timeout(), config.relay.write_timeout()),
        );
        let (relay, relay_task) = RelayQueue::start(
            transport,
            buffer,
            backend.access_point.clone(),
            backend.reporter.clone(),
            relay_settings(config),
        )
        .await;

        let sink: Arc<dyn RecordSink> = Arc::new(relay.clone());
        let manager = TrackerManager::new(
            backend.stack.clone(),
            sink,
            backend.reporter.clone(),
            tracker_settings(&config.scheduler),
        );
        for device in &config.devices {
            manager
                .track(device.address.clone())
                .await
                .with_context(|| format!("Failed to track {}", device.address))?;
            info!(
                device = %device.address,
                name = device.name.as_deref().unwrap_or("-"),
                "Configured device registered"
            );
        }

        info!(
            devices = config.devices.len(),
            radio = backend.stack.name(),
            "Tracker started"
        );
        Ok(Self {
            manager,
            relay,
            relay_task,
        })
    }

    pub fn manager(&self) -> &TrackerManager {
        &self.manager
    }

    pub fn relay(&self) -> &RelayHandle {
        &self.relay
    }

    /// 先停止所有跟踪器，再关闭中继
    pub async fn stop(self) -> Result<RelayStats> {
        self.manager.shutdown().await;
        let stats = self.relay.close().await.context("Relay stopped unexpectedly")?;
        if let Err(e) = self.relay_task.await {
            warn!(error = %e, "Relay task ended abnormally");
        }
        info!(
            delivered = stats.delivered,
            buffered = stats.buffered,
            drained = stats.drained,
            "Tracker stopped"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riot_config::DeviceEntry;
    use riot_types::DeviceAddress;

    #[test]
    fn test_settings_follow_config() {
        let mut config = TrackerConfig::default();
        config.scheduler.poll_interval_ms = 250;
        config.scheduler.skip_warmup_frames = false;
        config.buffer.write_retry_attempts = 2;

        let tracker = tracker_settings(&config.scheduler);
        assert_eq!(tracker.poll_interval, Duration::from_millis(250));
        assert_eq!(tracker.backoff_max, Duration::from_secs(30));
        assert!(!tracker.skip_warmup);

        let relay = relay_settings(&config);
        assert_eq!(relay.probe_interval, Duration::from_secs(1));
        assert_eq!(relay.write_retry_attempts, 2);
    }

    #[tokio::test]
    async fn test_simulated_backend_associates_with_matching_ssid() {
        let mut config = TrackerConfig::default();
        config.devices.push(DeviceEntry {
            address: DeviceAddress::new("AA:00:00:00:00:01"),
            name: None,
        });
        let backend = Backend::simulated(&config);

        assert!(ensure_associated(backend.access_point.as_ref(), true).await);
        assert!(backend.access_point.is_associated().await);
    }
}
