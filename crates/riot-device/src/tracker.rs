use crate::scheduler::{CycleOutcome, ReadScheduler, SchedulerAction, SchedulerState};
use crate::stack::{Connection, LinkEvent, WirelessStack};
use riot_types::{DeviceAddress, RecordSink, SharedStatusReporter};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

/// 跟踪器参数
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// 两次读取周期之间的间隔
    pub poll_interval: Duration,
    /// 连接加服务发现的时限
    pub discovery_timeout: Duration,
    /// 单个字段读取（以及断开）的时限
    pub read_timeout: Duration,
    /// 连接失败后的初始退避
    pub backoff_initial: Duration,
    /// 退避上限
    pub backoff_max: Duration,
    /// 丢弃预热帧
    pub skip_warmup: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            discovery_timeout: Duration::from_millis(10000),
            read_timeout: Duration::from_millis(5000),
            backoff_initial: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(30000),
            skip_warmup: true,
        }
    }
}

/// 连接失败的指数退避
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// 等待链路事件时的唤醒原因
enum Wake {
    Event(Option<LinkEvent>),
    Timeout,
    Cancel(bool),
}

/// 单设备异步驱动
///
/// 把无线栈的事件喂给 [`ReadScheduler`]，执行它返回的动作，
/// 并按轮询间隔（或连接失败后的退避）重复读取周期，直到被取消。
pub struct DeviceTracker {
    scheduler: ReadScheduler,
    stack: Arc<dyn WirelessStack>,
    sink: Arc<dyn RecordSink>,
    reporter: SharedStatusReporter,
    settings: TrackerSettings,
    state_tx: watch::Sender<SchedulerState>,
    cancel_rx: watch::Receiver<bool>,
    cancel_seen: bool,
}

impl DeviceTracker {
    pub fn new(
        address: DeviceAddress,
        stack: Arc<dyn WirelessStack>,
        sink: Arc<dyn RecordSink>,
        reporter: SharedStatusReporter,
        settings: TrackerSettings,
        state_tx: watch::Sender<SchedulerState>,
        cancel_rx: watch::Receiver<bool>,
    ) -> Self {
        let scheduler = ReadScheduler::new(address).with_skip_warmup(settings.skip_warmup);
        Self {
            scheduler,
            stack,
            sink,
            reporter,
            settings,
            state_tx,
            cancel_rx,
            cancel_seen: false,
        }
    }

    /// 运行直到取消
    pub async fn run(mut self) {
        let address = self.scheduler.address().clone();
        let mut backoff = Backoff::new(self.settings.backoff_initial, self.settings.backoff_max);
        info!(device = %address, stack = self.stack.name(), "Device tracking started");

        loop {
            if self.cancel_requested() {
                self.scheduler.cancel();
                break;
            }

            let outcome = match self.run_cycle().await {
                Some(outcome) => outcome,
                None => break,
            };
            debug!(device = %address, outcome = ?outcome, "Read cycle finished");

            let wait = match outcome {
                CycleOutcome::Cancelled => break,
                CycleOutcome::LinkFailed => backoff.next_delay(),
                _ => {
                    backoff.reset();
                    self.settings.poll_interval
                }
            };

            if !self.wait_or_cancel(wait).await {
                self.scheduler.cancel();
                break;
            }
        }

        self.publish();
        info!(device = %address, "Device tracking stopped");
    }

    /// 执行一个完整周期，返回周期结果；无法开始时返回 `None`
    async fn run_cycle(&mut self) -> Option<CycleOutcome> {
        let mut pending: VecDeque<SchedulerAction> = match self.scheduler.start() {
            Ok(actions) => actions.into(),
            Err(e) => {
                warn!(error = %e, "Cannot start read cycle");
                return None;
            }
        };
        self.publish();

        let mut connection: Option<Connection> = None;
        let mut deadline = Instant::now() + self.phase_timeout();
        let mut phase = self.scheduler.state();

        loop {
            while let Some(action) = pending.pop_front() {
                match action {
                    SchedulerAction::Connect => {
                        let address = self.scheduler.address().clone();
                        match timeout(self.settings.discovery_timeout, self.stack.connect(&address))
                            .await
                        {
                            Ok(Ok(conn)) => connection = Some(conn),
                            Ok(Err(e)) => pending.extend(self.scheduler.handle(
                                LinkEvent::ConnectFailed {
                                    reason: e.to_string(),
                                },
                            )),
                            Err(_) => pending.extend(self.scheduler.handle(
                                LinkEvent::ConnectFailed {
                                    reason: "connect timed out".to_string(),
                                },
                            )),
                        }
                    }
                    SchedulerAction::DiscoverServices => {
                        let result = match &connection {
                            Some(conn) => conn.session.discover_services().await,
                            None => Err(crate::DeviceError::link("no connection")),
                        };
                        if let Err(e) = result {
                            pending.extend(self.scheduler.fail(&e.to_string()));
                        }
                    }
                    SchedulerAction::RequestRead(field) => {
                        let result = match &connection {
                            Some(conn) => conn.session.request_read(field).await,
                            None => Err(crate::DeviceError::link("no connection")),
                        };
                        if let Err(e) = result {
                            pending.extend(self.scheduler.fail(&e.to_string()));
                        }
                    }
                    SchedulerAction::Disconnect => match &connection {
                        Some(conn) => {
                            if let Err(e) = conn.session.disconnect().await {
                                debug!(device = %self.scheduler.address(), error = %e, "Disconnect request failed");
                                pending.extend(self.scheduler.fail(&e.to_string()));
                            }
                        }
                        None => pending.extend(self.scheduler.handle(LinkEvent::Disconnected)),
                    },
                    SchedulerAction::Relay(record) => self.sink.submit(record),
                    SchedulerAction::Report(level, message) => {
                        self.reporter.report_status(level, &message)
                    }
                    SchedulerAction::CycleEnded(outcome) => {
                        self.publish();
                        return Some(outcome);
                    }
                }
            }

            if self.scheduler.state() != phase {
                phase = self.scheduler.state();
                deadline = Instant::now() + self.phase_timeout();
                self.publish();
            }

            let Some(conn) = connection.as_mut() else {
                // 没有链路可等，直接视为断开
                pending.extend(self.scheduler.handle(LinkEvent::Disconnected));
                continue;
            };

            let cancel_seen = self.cancel_seen;
            let wake = {
                let cancel_rx = &mut self.cancel_rx;
                tokio::select! {
                    event = conn.events.recv() => Wake::Event(event),
                    _ = sleep_until(deadline) => Wake::Timeout,
                    changed = cancel_rx.changed(), if !cancel_seen => Wake::Cancel(changed.is_err()),
                }
            };

            match wake {
                Wake::Event(Some(event)) => pending.extend(self.scheduler.handle(event)),
                Wake::Event(None) => {
                    connection = None;
                    pending.extend(self.scheduler.handle(LinkEvent::Disconnected));
                }
                Wake::Timeout => {
                    pending.extend(self.scheduler.fail("timed out"));
                    deadline = Instant::now() + self.phase_timeout();
                }
                Wake::Cancel(closed) => {
                    if closed || *self.cancel_rx.borrow() {
                        self.cancel_seen = true;
                        pending.extend(self.scheduler.cancel());
                    }
                }
            }
        }
    }

    fn phase_timeout(&self) -> Duration {
        match self.scheduler.state() {
            SchedulerState::Connecting | SchedulerState::DiscoveringServices => {
                self.settings.discovery_timeout
            }
            _ => self.settings.read_timeout,
        }
    }

    fn cancel_requested(&mut self) -> bool {
        if self.cancel_seen || *self.cancel_rx.borrow() {
            self.cancel_seen = true;
        }
        self.cancel_seen
    }

    /// 等待下一个周期；被取消时返回 `false`
    async fn wait_or_cancel(&mut self, wait: Duration) -> bool {
        if self.cancel_requested() {
            return false;
        }
        let closed = tokio::select! {
            _ = sleep(wait) => false,
            changed = self.cancel_rx.changed() => changed.is_err(),
        };
        if closed {
            self.cancel_seen = true;
        }
        !self.cancel_requested()
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.scheduler.state());
    }
}
