use crate::access_point::AccessPoint;
use crate::drain::{BufferDrain, DrainOutcome};
use crate::error::{RelayError, Result};
use crate::link::{LinkMonitor, LinkState};
use crate::transport::Transport;
use riot_storage::SharedBuffer;
use riot_types::{Record, RecordSink, SharedStatusReporter, StatusLevel};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// 中继参数
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// 链路断开时的探测间隔
    pub probe_interval: Duration,
    /// 缓冲写入失败后的重试次数
    pub write_retry_attempts: u32,
    /// 缓冲写入重试间隔
    pub write_retry_delay: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(1000),
            write_retry_attempts: 5,
            write_retry_delay: Duration::from_millis(200),
        }
    }
}

/// 中继统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// 直接投递成功的记录数
    pub delivered: u64,
    /// 写入缓冲区的记录数
    pub buffered: u64,
    /// 排空时投递成功的记录数
    pub drained: u64,
    /// 探测次数
    pub probes: u64,
    /// 探测循环启动次数
    pub monitor_arms: u64,
    /// 暂存在内存中、尚未写入缓冲区的记录数
    pub spilled: u64,
    pub link: Option<LinkState>,
}

enum RelayCommand {
    Submit(Record),
    Stats(oneshot::Sender<RelayStats>),
    Close(oneshot::Sender<RelayStats>),
}

/// 中继句柄
///
/// 可以自由克隆；所有链路状态转移都在后台任务里串行完成。
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<RelayCommand>,
    link_rx: watch::Receiver<LinkState>,
}

impl RelayHandle {
    /// 提交记录，立即返回
    pub fn relay(&self, record: Record) -> Result<()> {
        self.tx
            .send(RelayCommand::Submit(record))
            .map_err(|_| RelayError::Closed)
    }

    pub fn link_state(&self) -> LinkState {
        *self.link_rx.borrow()
    }

    pub fn subscribe_link(&self) -> watch::Receiver<LinkState> {
        self.link_rx.clone()
    }

    /// 统计快照；在此之前提交的记录都已处理完
    pub async fn stats(&self) -> Result<RelayStats> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(RelayCommand::Stats(tx))
            .map_err(|_| RelayError::Closed)?;
        rx.await.map_err(|_| RelayError::Closed)
    }

    /// 处理完已提交的记录后停止中继任务
    pub async fn close(&self) -> Result<RelayStats> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(RelayCommand::Close(tx))
            .map_err(|_| RelayError::Closed)?;
        rx.await.map_err(|_| RelayError::Closed)
    }
}

impl RecordSink for RelayHandle {
    fn submit(&self, record: Record) {
        if let Err(e) = self.relay(record) {
            error!(error = %e, "Record dropped, relay queue closed");
        }
    }
}

/// 中继队列
pub struct RelayQueue;

impl RelayQueue {
    /// 启动中继任务
    ///
    /// 缓冲区里有上次遗留的记录时，以 DOWN 状态启动并立即安排探测。
    pub async fn start(
        transport: Arc<dyn Transport>,
        buffer: SharedBuffer,
        access_point: Arc<dyn AccessPoint>,
        reporter: SharedStatusReporter,
        settings: RelaySettings,
    ) -> (RelayHandle, JoinHandle<()>) {
        let leftover = match buffer.count().await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "Cannot read record buffer at startup");
                0
            }
        };

        let initial = if leftover > 0 {
            LinkState::Down
        } else {
            LinkState::Up
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = watch::channel(initial);

        let mut actor = RelayActor {
            transport,
            buffer,
            access_point,
            reporter,
            settings,
            link: initial,
            link_tx,
            monitor: LinkMonitor::new(),
            spill: VecDeque::new(),
            stats: RelayStats::default(),
        };
        if leftover > 0 {
            info!(buffered = leftover, "Recovered records from previous run");
            actor.arm_monitor();
        }
        info!(
            endpoint = %actor.transport.endpoint(),
            buffer = %actor.buffer.backend_type(),
            link = %initial,
            "Relay queue started"
        );

        let task = tokio::spawn(actor.run(rx));
        (RelayHandle { tx, link_rx }, task)
    }
}

enum Wake {
    Command(Option<RelayCommand>),
    ProbeDue,
}

struct RelayActor {
    transport: Arc<dyn Transport>,
    buffer: SharedBuffer,
    access_point: Arc<dyn AccessPoint>,
    reporter: SharedStatusReporter,
    settings: RelaySettings,
    link: LinkState,
    link_tx: watch::Sender<LinkState>,
    monitor: LinkMonitor,
    /// 缓冲区写不进去时暂存，保持提交顺序
    spill: VecDeque<Record>,
    stats: RelayStats,
}

impl RelayActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RelayCommand>) {
        loop {
            let deadline = self.monitor.deadline();
            let wake = tokio::select! {
                command = rx.recv() => Wake::Command(command),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    Wake::ProbeDue
                }
            };

            match wake {
                Wake::Command(Some(RelayCommand::Submit(record))) => self.on_submit(record).await,
                Wake::Command(Some(RelayCommand::Stats(reply))) => {
                    let _ = reply.send(self.snapshot());
                }
                Wake::Command(Some(RelayCommand::Close(reply))) => {
                    rx.close();
                    // 关闭前已排队的记录照常处理
                    while let Ok(command) = rx.try_recv() {
                        if let RelayCommand::Submit(record) = command {
                            self.on_submit(record).await;
                        }
                    }
                    self.on_close().await;
                    let _ = reply.send(self.snapshot());
                    return;
                }
                Wake::Command(None) => {
                    self.on_close().await;
                    return;
                }
                Wake::ProbeDue => self.on_probe_due().await,
            }
        }
    }

    async fn on_submit(&mut self, record: Record) {
        self.flush_spill().await;

        match self.link {
            LinkState::Up => match self.transport.deliver(record.as_bytes()).await {
                Ok(()) => {
                    self.stats.delivered += 1;
                    debug!(record = %record, "Record sent");
                    self.reporter.report_status(StatusLevel::Ok, "Record sent");
                }
                Err(e) => {
                    warn!(error = %e, "Delivery failed, buffering");
                    self.set_link(LinkState::Down);
                    self.buffer_record(record).await;
                    self.arm_monitor();
                }
            },
            LinkState::Down => self.buffer_record(record).await,
        }
    }

    async fn on_probe_due(&mut self) {
        self.stats.probes += 1;
        match self.transport.probe().await {
            Ok(()) => {
                info!(endpoint = %self.transport.endpoint(), "Endpoint reachable again");
                self.monitor.disarm();
                self.set_link(LinkState::Up);
                self.reporter
                    .report_status(StatusLevel::Ok, "Connection restored, sending buffered records");
                self.drain().await;
            }
            Err(e) => {
                debug!(error = %e, "Probe failed");
                self.monitor
                    .reschedule(Instant::now() + self.settings.probe_interval);
                if !self.access_point.is_associated().await {
                    info!("Access point association lost, re-associating");
                    self.access_point.associate().await;
                }
            }
        }
    }

    /// 链路恢复后的一次排空
    async fn drain(&mut self) {
        self.flush_spill().await;

        let outcome = BufferDrain::new(self.buffer.as_ref(), self.transport.as_ref())
            .run()
            .await;
        self.stats.drained += outcome.delivered();

        match outcome {
            DrainOutcome::Completed { delivered } => {
                // 缓冲区写不进去的记录排在最后
                while let Some(record) = self.spill.pop_front() {
                    if let Err(e) = self.transport.deliver(record.as_bytes()).await {
                        warn!(error = %e, "Delivery of parked record failed");
                        self.spill.push_front(record);
                        self.set_link(LinkState::Down);
                        self.arm_monitor();
                        return;
                    }
                    self.stats.drained += 1;
                }
                if delivered > 0 {
                    self.reporter.report_status(
                        StatusLevel::Ok,
                        &format!("Sent {} buffered records", delivered),
                    );
                }
            }
            DrainOutcome::Interrupted { delivered, error } => {
                warn!(delivered, error = %error, "Drain interrupted, link down again");
                self.set_link(LinkState::Down);
                self.arm_monitor();
            }
            DrainOutcome::StorageFailed { delivered, error } => {
                error!(delivered, error = %error, "Record buffer failed during drain");
                self.set_link(LinkState::Down);
                self.arm_monitor();
            }
        }
    }

    /// 写入缓冲区，失败按配置重试，仍失败则暂存内存
    async fn buffer_record(&mut self, record: Record) {
        self.reporter
            .report_status(StatusLevel::Warning, "Connection down, buffering");

        if !self.spill.is_empty() {
            self.spill.push_back(record);
            return;
        }

        let attempts = self.settings.write_retry_attempts.max(1);
        for attempt in 1..=attempts {
            match self.buffer.append(&record).await {
                Ok(seq) => {
                    self.stats.buffered += 1;
                    debug!(seq, "Record buffered");
                    return;
                }
                Err(e) => {
                    error!(attempt, attempts, error = %e, "Buffer write failed");
                    if attempt < attempts {
                        sleep(self.settings.write_retry_delay).await;
                    }
                }
            }
        }

        error!(parked = self.spill.len() + 1, "Record parked in memory until the buffer recovers");
        self.reporter
            .report_status(StatusLevel::Error, "Record buffer unavailable");
        self.spill.push_back(record);
    }

    /// 把暂存的记录按顺序写回缓冲区
    async fn flush_spill(&mut self) {
        while let Some(record) = self.spill.front() {
            match self.buffer.append(record).await {
                Ok(_) => {
                    self.spill.pop_front();
                    self.stats.buffered += 1;
                }
                Err(e) => {
                    debug!(parked = self.spill.len(), error = %e, "Buffer still unavailable");
                    break;
                }
            }
        }
    }

    fn arm_monitor(&mut self) {
        if self
            .monitor
            .arm(Instant::now() + self.settings.probe_interval)
        {
            info!(interval_ms = self.settings.probe_interval.as_millis() as u64, "Link monitor armed");
        }
    }

    fn set_link(&mut self, state: LinkState) {
        if self.link == state {
            return;
        }
        info!(from = %self.link, to = %state, "Link state changed");
        self.link = state;
        self.link_tx.send_replace(state);
    }

    async fn on_close(&mut self) {
        self.flush_spill().await;
        if !self.spill.is_empty() {
            error!(lost = self.spill.len(), "Relay closed with records not persisted");
        }
        let stats = self.snapshot();
        info!(
            delivered = stats.delivered,
            buffered = stats.buffered,
            drained = stats.drained,
            "Relay queue stopped"
        );
    }

    fn snapshot(&self) -> RelayStats {
        RelayStats {
            monitor_arms: self.monitor.arms(),
            spilled: self.spill.len() as u64,
            link: Some(self.link),
            ..self.stats.clone()
        }
    }
}
