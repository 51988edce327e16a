use crate::scheduler::SchedulerState;
use crate::stack::WirelessStack;
use crate::tracker::{DeviceTracker, TrackerSettings};
use crate::{DeviceError, Result};
use riot_types::{DeviceAddress, RecordSink, SharedStatusReporter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 单个被跟踪设备的句柄
struct TrackerHandle {
    cancel_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<SchedulerState>,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    async fn stop(self, address: &DeviceAddress) {
        self.cancel();
        if let Err(e) = self.task.await {
            warn!(device = %address, error = %e, "Tracker task ended abnormally");
        }
    }
}

/// 设备跟踪管理器
///
/// 每个设备一个独立的跟踪任务，设备之间不共享可变状态。
/// 同一地址只允许一个状态机。
pub struct TrackerManager {
    stack: Arc<dyn WirelessStack>,
    sink: Arc<dyn RecordSink>,
    reporter: SharedStatusReporter,
    settings: TrackerSettings,
    trackers: RwLock<HashMap<DeviceAddress, TrackerHandle>>,
    shut_down: AtomicBool,
}

impl TrackerManager {
    pub fn new(
        stack: Arc<dyn WirelessStack>,
        sink: Arc<dyn RecordSink>,
        reporter: SharedStatusReporter,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            stack,
            sink,
            reporter,
            settings,
            trackers: RwLock::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// 开始跟踪设备
    pub async fn track(&self, address: DeviceAddress) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(DeviceError::ShutDown);
        }

        let mut trackers = self.trackers.write().await;
        if let Some(existing) = trackers.get(&address) {
            if !existing.task.is_finished() {
                return Err(DeviceError::AlreadyTracked(address));
            }
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let tracker = DeviceTracker::new(
            address.clone(),
            self.stack.clone(),
            self.sink.clone(),
            self.reporter.clone(),
            self.settings.clone(),
            state_tx,
            cancel_rx,
        );
        let task = tokio::spawn(tracker.run());

        trackers.insert(
            address.clone(),
            TrackerHandle {
                cancel_tx,
                state_rx,
                task,
            },
        );
        info!(device = %address, total = trackers.len(), "Device tracked");
        Ok(())
    }

    /// 停止跟踪设备，等待其跟踪任务退出
    pub async fn untrack(&self, address: &DeviceAddress) -> Result<()> {
        let handle = self
            .trackers
            .write()
            .await
            .remove(address)
            .ok_or_else(|| DeviceError::NotTracked(address.clone()))?;
        handle.stop(address).await;
        info!(device = %address, "Device untracked");
        Ok(())
    }

    /// 当前跟踪的设备地址
    pub async fn tracked(&self) -> Vec<DeviceAddress> {
        let trackers = self.trackers.read().await;
        let mut addresses: Vec<_> = trackers.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// 设备当前的调度器状态
    pub async fn state(&self, address: &DeviceAddress) -> Option<SchedulerState> {
        let trackers = self.trackers.read().await;
        trackers.get(address).map(|h| *h.state_rx.borrow())
    }

    /// 订阅设备状态变化
    pub async fn subscribe_state(
        &self,
        address: &DeviceAddress,
    ) -> Option<watch::Receiver<SchedulerState>> {
        let trackers = self.trackers.read().await;
        trackers.get(address).map(|h| h.state_rx.clone())
    }

    /// 停止全部跟踪任务
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let drained: Vec<_> = self.trackers.write().await.drain().collect();
        let count = drained.len();
        // 先全部取消，再逐个等待退出
        for (_, handle) in &drained {
            handle.cancel();
        }
        for (address, handle) in drained {
            handle.stop(&address).await;
        }
        info!(stopped = count, "Tracker manager shut down");
    }
}
