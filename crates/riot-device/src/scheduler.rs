use crate::error::{DeviceError, Result};
use crate::stack::LinkEvent;
use riot_sensor::{FieldValues, SensorKind};
use riot_types::{DeviceAddress, Record, StatusLevel};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// 读取调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Connecting,
    DiscoveringServices,
    /// 正在读取第 i 个字段
    Reading(usize),
    Emitting,
    Disconnecting,
    Terminated,
}

impl SchedulerState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reading(i) => write!(f, "Reading({})", i),
            other => write!(f, "{:?}", other),
        }
    }
}

/// 一个读取周期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleOutcome {
    /// 记录已交给中继
    Emitted,
    /// 预热帧，已丢弃
    Warmup,
    /// 字段读取失败，周期中止
    Aborted,
    /// 连接或发现失败
    LinkFailed,
    /// 未识别的服务
    Unrecognized,
    /// 跟踪被取消
    Cancelled,
}

/// 状态转移产生的动作，由驱动层执行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerAction {
    Connect,
    DiscoverServices,
    RequestRead(&'static str),
    Disconnect,
    Relay(Record),
    Report(StatusLevel, String),
    CycleEnded(CycleOutcome),
}

pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// 单设备读取状态机
///
/// 纯同步，每个事件只推进一次转移并返回需要执行的动作；
/// 不做任何 I/O，因此字段读取天然按声明顺序串行。
pub struct ReadScheduler {
    address: DeviceAddress,
    state: SchedulerState,
    sensor: Option<SensorKind>,
    values: FieldValues,
    outcome: CycleOutcome,
    cancelled: bool,
    skip_warmup: bool,
    clock: Clock,
}

impl ReadScheduler {
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            state: SchedulerState::Idle,
            sensor: None,
            values: FieldValues::new(),
            outcome: CycleOutcome::Aborted,
            cancelled: false,
            skip_warmup: true,
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_skip_warmup(mut self, skip: bool) -> Self {
        self.skip_warmup = skip;
        self
    }

    /// 替换时间源（秒级 Unix 时间戳）
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn sensor(&self) -> Option<SensorKind> {
        self.sensor
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// 开始新的读取周期
    ///
    /// 只有 Idle 状态可以开始，避免同一设备出现重叠的周期。
    pub fn start(&mut self) -> Result<Vec<SchedulerAction>> {
        if self.state != SchedulerState::Idle || !self.values.is_empty() {
            return Err(DeviceError::Busy {
                address: self.address.clone(),
                state: self.state.to_string(),
            });
        }
        self.transition(SchedulerState::Connecting);
        Ok(vec![SchedulerAction::Connect])
    }

    /// 处理一个链路事件
    pub fn handle(&mut self, event: LinkEvent) -> Vec<SchedulerAction> {
        match (self.state, event) {
            (SchedulerState::Connecting, LinkEvent::Connected) => {
                self.transition(SchedulerState::DiscoveringServices);
                vec![
                    SchedulerAction::Report(
                        StatusLevel::Ok,
                        format!("Device {} connected", self.address),
                    ),
                    SchedulerAction::DiscoverServices,
                ]
            }
            (SchedulerState::Connecting, LinkEvent::ConnectFailed { reason }) => {
                debug!(device = %self.address, reason = %reason, "Connect failed");
                self.finish_cycle(CycleOutcome::LinkFailed)
            }
            (SchedulerState::DiscoveringServices, LinkEvent::ServicesDiscovered(services)) => {
                match SensorKind::identify_any(&services) {
                    Some(kind) => {
                        self.sensor = Some(kind);
                        self.transition(SchedulerState::Reading(0));
                        vec![SchedulerAction::RequestRead(kind.fields()[0].id)]
                    }
                    None => {
                        debug!(device = %self.address, services = ?services, "No known sensor service");
                        self.begin_disconnect(CycleOutcome::Unrecognized)
                    }
                }
            }
            (SchedulerState::Reading(index), LinkEvent::FieldRead { field, value }) => {
                self.on_field_read(index, &field, &value)
            }
            (SchedulerState::Reading(_), LinkEvent::ReadFailed { field, reason }) => {
                warn!(device = %self.address, field = %field, reason = %reason, "Field read failed, aborting cycle");
                self.begin_disconnect(CycleOutcome::Aborted)
            }
            (SchedulerState::Disconnecting, LinkEvent::Disconnected) => {
                let outcome = self.outcome;
                self.finish_cycle(outcome)
            }
            (SchedulerState::Idle | SchedulerState::Terminated, event) => {
                debug!(device = %self.address, event = ?event, "Ignoring event while not in a cycle");
                Vec::new()
            }
            (_, LinkEvent::Disconnected) => {
                warn!(device = %self.address, state = %self.state, "Link lost mid-cycle");
                self.finish_cycle(CycleOutcome::LinkFailed)
            }
            (state, event) => {
                debug!(device = %self.address, state = %state, event = ?event, "Unexpected event ignored");
                Vec::new()
            }
        }
    }

    /// 当前阶段失败（超时或请求发不出去）
    pub fn fail(&mut self, reason: &str) -> Vec<SchedulerAction> {
        match self.state {
            SchedulerState::Connecting | SchedulerState::DiscoveringServices => {
                warn!(device = %self.address, state = %self.state, reason = %reason, "Link setup failed");
                self.begin_disconnect(CycleOutcome::LinkFailed)
            }
            SchedulerState::Reading(_) | SchedulerState::Emitting => {
                warn!(device = %self.address, state = %self.state, reason = %reason, "Read failed, aborting cycle");
                self.begin_disconnect(CycleOutcome::Aborted)
            }
            // 断开本身失败时直接视为已断开
            SchedulerState::Disconnecting => {
                let outcome = self.outcome;
                self.finish_cycle(outcome)
            }
            SchedulerState::Idle | SchedulerState::Terminated => Vec::new(),
        }
    }

    /// 取消跟踪
    ///
    /// 周期进行中时丢弃已读到的值并断开，不会发出记录。
    pub fn cancel(&mut self) -> Vec<SchedulerAction> {
        self.cancelled = true;
        match self.state {
            SchedulerState::Idle => {
                self.transition(SchedulerState::Terminated);
                Vec::new()
            }
            SchedulerState::Terminated | SchedulerState::Disconnecting => Vec::new(),
            _ => self.begin_disconnect(CycleOutcome::Cancelled),
        }
    }

    fn on_field_read(&mut self, index: usize, field: &str, raw: &[u8]) -> Vec<SchedulerAction> {
        let Some(kind) = self.sensor else {
            return self.begin_disconnect(CycleOutcome::Aborted);
        };
        let fields = kind.fields();
        let expected = &fields[index];
        if !expected.matches(field) {
            debug!(device = %self.address, expected = expected.name, got = %field, "Out-of-order read ignored");
            return Vec::new();
        }

        if let Err(e) = kind.store(&mut self.values, field, raw) {
            warn!(device = %self.address, error = %e, "Field decode failed, aborting cycle");
            return self.begin_disconnect(CycleOutcome::Aborted);
        }

        let next = index + 1;
        if next < fields.len() {
            self.transition(SchedulerState::Reading(next));
            return vec![SchedulerAction::RequestRead(fields[next].id)];
        }

        self.transition(SchedulerState::Emitting);
        self.emit(kind)
    }

    fn emit(&mut self, kind: SensorKind) -> Vec<SchedulerAction> {
        let mut actions = Vec::new();

        if self.skip_warmup && kind.is_warmup(&self.values) {
            debug!(device = %self.address, "Warm-up frame dropped");
            actions.push(SchedulerAction::Report(
                StatusLevel::Warning,
                format!("Sensor {} warming up", self.address),
            ));
            actions.extend(self.begin_disconnect(CycleOutcome::Warmup));
            return actions;
        }

        let outcome = match kind.serialize(&self.values, (self.clock)()) {
            Ok(record) => {
                debug!(device = %self.address, record = %record, "Record built");
                actions.push(SchedulerAction::Relay(record));
                CycleOutcome::Emitted
            }
            Err(e) => {
                warn!(device = %self.address, error = %e, "Record not built");
                CycleOutcome::Aborted
            }
        };
        actions.extend(self.begin_disconnect(outcome));
        actions
    }

    fn begin_disconnect(&mut self, outcome: CycleOutcome) -> Vec<SchedulerAction> {
        self.values.clear();
        self.outcome = outcome;
        self.transition(SchedulerState::Disconnecting);
        vec![SchedulerAction::Disconnect]
    }

    fn finish_cycle(&mut self, outcome: CycleOutcome) -> Vec<SchedulerAction> {
        self.values.clear();
        self.sensor = None;
        if self.cancelled {
            self.transition(SchedulerState::Terminated);
            vec![SchedulerAction::CycleEnded(CycleOutcome::Cancelled)]
        } else {
            self.transition(SchedulerState::Idle);
            vec![SchedulerAction::CycleEnded(outcome)]
        }
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!(device = %self.address, from = %self.state, to = %next, "Scheduler transition");
        self.state = next;
    }
}
