//! 设备读取调度
//!
//! 每个被跟踪的设备由一个 [`ReadScheduler`] 状态机描述，
//! [`DeviceTracker`] 负责把无线栈事件驱动进状态机并执行它产生的动作。

pub mod error;
pub mod manager;
pub mod scheduler;
pub mod simulated;
pub mod stack;
pub mod tracker;

pub use error::{DeviceError, Result};
pub use manager::TrackerManager;
pub use scheduler::{Clock, CycleOutcome, ReadScheduler, SchedulerAction, SchedulerState};
pub use simulated::SimulatedStack;
pub use stack::{Connection, GattSession, LinkEvent, WirelessStack};
pub use tracker::{DeviceTracker, TrackerSettings};
