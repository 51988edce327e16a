use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

/// 接入点关联
///
/// 采集端点位于网关自己的 Wi-Fi 热点之后，中继前需要先关联到热点。
/// 具体的 Wi-Fi 操作不在本仓库内。
#[async_trait]
pub trait AccessPoint: Send + Sync {
    async fn is_associated(&self) -> bool;

    /// 尝试关联，返回是否成功
    async fn associate(&self) -> bool;
}

/// 始终视为已关联
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAccessPoint;

#[async_trait]
impl AccessPoint for NullAccessPoint {
    async fn is_associated(&self) -> bool {
        true
    }

    async fn associate(&self) -> bool {
        true
    }
}

/// SSID 匹配模式，只支持结尾的 `*` 通配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsidPattern {
    prefix: String,
    wildcard: bool,
}

impl SsidPattern {
    pub fn new(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => Self {
                prefix: prefix.to_string(),
                wildcard: true,
            },
            None => Self {
                prefix: pattern.to_string(),
                wildcard: false,
            },
        }
    }

    /// 通配部分只允许数字和大写字母
    pub fn matches(&self, ssid: &str) -> bool {
        if !self.wildcard {
            return ssid == self.prefix;
        }
        match ssid.strip_prefix(&self.prefix) {
            Some(rest) => rest
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()),
            None => false,
        }
    }
}

/// 模拟接入点
///
/// 从可见热点中选第一个匹配模式的进行关联，用于模拟模式和测试。
pub struct SimulatedAccessPoint {
    pattern: SsidPattern,
    visible: Vec<String>,
    associated: AtomicBool,
    current: Mutex<Option<String>>,
    attempts: AtomicU64,
}

impl SimulatedAccessPoint {
    pub fn new(pattern: &str, visible: Vec<String>) -> Self {
        Self {
            pattern: SsidPattern::new(pattern),
            visible,
            associated: AtomicBool::new(false),
            current: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    /// 模拟掉线
    pub fn drop_association(&self) {
        self.associated.store(false, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn current_ssid(&self) -> Option<String> {
        self.current.lock().ok().and_then(|c| c.clone())
    }
}

#[async_trait]
impl AccessPoint for SimulatedAccessPoint {
    async fn is_associated(&self) -> bool {
        self.associated.load(Ordering::SeqCst)
    }

    async fn associate(&self) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let Some(ssid) = self.visible.iter().find(|s| self.pattern.matches(s)) else {
            warn!(visible = self.visible.len(), "No matching access point in range");
            return false;
        };
        if let Ok(mut current) = self.current.lock() {
            *current = Some(ssid.clone());
        }
        self.associated.store(true, Ordering::SeqCst);
        info!(ssid = %ssid, "Associated with access point");
        true
    }
}

/// 中继启动前确认已关联
pub async fn ensure_associated(access_point: &dyn AccessPoint, associate: bool) -> bool {
    if access_point.is_associated().await {
        return true;
    }
    if !associate {
        warn!("Not associated with an access point, relay may be unreachable");
        return false;
    }
    access_point.associate().await
}
