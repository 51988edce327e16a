use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::TrackerConfig;

const CONFIG_FILE: &str = "tracker.toml";
const ENV_PREFIX: &str = "RIOT";

/// 配置加载器
///
/// 读取 `<dir>/tracker.toml`，再叠加 `RIOT_` 前缀的环境变量
/// （层级用 `__` 分隔，如 `RIOT_RELAY__PORT=6000`）。
pub struct ConfigLoader {
    config_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// 更换环境变量前缀
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// 加载配置，文件不存在时使用默认值
    pub fn load(&self) -> Result<TrackerConfig> {
        let config_path = self.config_path();
        if config_path.exists() {
            info!(path = %config_path.display(), "Loading configuration");
        } else {
            debug!(path = %config_path.display(), "Config file not found, using defaults");
        }

        let config = Config::builder()
            .add_source(
                File::new(
                    config_path
                        .to_str()
                        .ok_or_else(|| anyhow!("Invalid config path"))?,
                    FileFormat::Toml,
                )
                .required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        config
            .try_deserialize()
            .context("Invalid tracker configuration")
    }

    /// 加载并校验
    pub fn load_validated(&self) -> Result<TrackerConfig> {
        let config = self.load()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(config: &TrackerConfig) -> Result<()> {
        if config.relay.host.trim().is_empty() {
            return Err(anyhow!("relay.host must not be empty"));
        }

        if config.relay.port == 0 {
            return Err(anyhow!("relay.port must be greater than 0"));
        }

        if config.relay.probe_interval_ms == 0 {
            return Err(anyhow!("relay.probe_interval_ms must be greater than 0"));
        }

        if config.scheduler.poll_interval_ms == 0 {
            return Err(anyhow!("scheduler.poll_interval_ms must be greater than 0"));
        }

        if config.scheduler.reconnect_backoff_initial_ms > config.scheduler.reconnect_backoff_max_ms
        {
            return Err(anyhow!(
                "reconnect_backoff_initial_ms ({}) cannot be greater than reconnect_backoff_max_ms ({})",
                config.scheduler.reconnect_backoff_initial_ms,
                config.scheduler.reconnect_backoff_max_ms
            ));
        }

        let mut seen = HashSet::new();
        for device in &config.devices {
            if !seen.insert(device.address.clone()) {
                return Err(anyhow!("Duplicate device address: {}", device.address));
            }
        }

        Ok(())
    }
}
