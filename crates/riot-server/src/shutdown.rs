use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

/// 关闭信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM
    Terminate,

    /// SIGINT / Ctrl+C
    Interrupt,

    /// 手动触发
    Manual,
}

/// 信号处理器
pub struct SignalHandler {
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl SignalHandler {
    pub fn new() -> (Self, broadcast::Receiver<ShutdownSignal>) {
        let (tx, rx) = broadcast::channel(16);
        (Self { shutdown_tx: tx }, rx)
    }

    /// 等待系统信号，或者手动触发
    #[cfg(unix)]
    pub async fn wait(&self) -> std::io::Result<ShutdownSignal> {
        use signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut manual = self.shutdown_tx.subscribe();

        let received = tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                ShutdownSignal::Terminate
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                ShutdownSignal::Interrupt
            }
            signal = manual.recv() => return Ok(signal.unwrap_or(ShutdownSignal::Manual)),
        };
        let _ = self.shutdown_tx.send(received);
        Ok(received)
    }

    /// 等待系统信号（非 unix 平台只有 Ctrl+C）
    #[cfg(not(unix))]
    pub async fn wait(&self) -> std::io::Result<ShutdownSignal> {
        let mut manual = self.shutdown_tx.subscribe();
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C");
                let _ = self.shutdown_tx.send(ShutdownSignal::Interrupt);
                Ok(ShutdownSignal::Interrupt)
            }
            signal = manual.recv() => Ok(signal.unwrap_or(ShutdownSignal::Manual)),
        }
    }

    /// 手动触发关闭
    pub fn trigger_shutdown(&self) {
        info!("Manual shutdown triggered");
        let _ = self.shutdown_tx.send(ShutdownSignal::Manual);
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.shutdown_tx.subscribe()
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_manual_trigger_reaches_subscribers() {
        let (handler, mut rx1) = SignalHandler::new();
        let mut rx2 = handler.subscribe();

        handler.trigger_shutdown();

        assert_eq!(rx1.recv().await.unwrap(), ShutdownSignal::Manual);
        assert_eq!(rx2.recv().await.unwrap(), ShutdownSignal::Manual);
    }

    #[tokio::test]
    async fn test_wait_returns_on_manual_trigger() {
        let handler = Arc::new(SignalHandler::default());
        let waiter = {
            let handler = handler.clone();
            tokio::spawn(async move { handler.wait().await })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        handler.trigger_shutdown();
        let signal = waiter.await.unwrap().unwrap();
        assert_eq!(signal, ShutdownSignal::Manual);
    }
}
