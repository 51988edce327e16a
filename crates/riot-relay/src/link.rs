use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// 端点可达状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    Down,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// 链路探测计划
///
/// 只记录下一次探测的时间，由中继任务独占，任何时刻最多一个探测循环。
#[derive(Debug, Default)]
pub struct LinkMonitor {
    deadline: Option<Instant>,
    arms: u64,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动探测循环；已经在运行时返回 `false`，不会再启动第二个
    pub fn arm(&mut self, first_probe: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(first_probe);
        self.arms += 1;
        true
    }

    /// 探测失败后安排下一次
    pub fn reschedule(&mut self, next_probe: Instant) {
        if self.deadline.is_some() {
            self.deadline = Some(next_probe);
        }
    }

    /// 探测成功，停止循环
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// 累计启动次数
    pub fn arms(&self) -> u64 {
        self.arms
    }
}
