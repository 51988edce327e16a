use crate::error::{RelayError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// 记录投递通道
#[async_trait]
pub trait Transport: Send + Sync {
    /// 投递一条记录的字节
    ///
    /// 返回 `Ok` 即视为投递成功，协议层没有确认消息。
    async fn deliver(&self, payload: &[u8]) -> Result<()>;

    /// 轻量可达性探测
    async fn probe(&self) -> Result<()>;

    /// 端点描述，用于日志
    fn endpoint(&self) -> &str;
}

/// TCP 投递
///
/// 每条记录使用一条新连接：连接、写完、关闭写端。
#[derive(Debug, Clone)]
pub struct TcpTransport {
    endpoint: String,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            endpoint: format!("{}:{}", host, port),
            connect_timeout: Duration::from_millis(3000),
            write_timeout: Duration::from_millis(3000),
        }
    }

    pub fn with_timeouts(mut self, connect_timeout: Duration, write_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.write_timeout = write_timeout;
        self
    }

    async fn open(&self) -> Result<TcpStream> {
        match timeout(self.connect_timeout, TcpStream::connect(&self.endpoint)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(RelayError::Connect {
                endpoint: self.endpoint.clone(),
                source,
            }),
            Err(_) => Err(RelayError::Timeout {
                operation: "connect",
                endpoint: self.endpoint.clone(),
            }),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn deliver(&self, payload: &[u8]) -> Result<()> {
        let mut stream = self.open().await?;

        let write = async {
            stream.write_all(payload).await?;
            stream.shutdown().await
        };
        match timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {
                debug!(endpoint = %self.endpoint, bytes = payload.len(), "Record delivered");
                Ok(())
            }
            Ok(Err(source)) => Err(RelayError::Write {
                endpoint: self.endpoint.clone(),
                source,
            }),
            Err(_) => Err(RelayError::Timeout {
                operation: "write",
                endpoint: self.endpoint.clone(),
            }),
        }
    }

    async fn probe(&self) -> Result<()> {
        let mut stream = self.open().await?;
        // 探测只需要握手成功，关闭失败不影响结果
        let _ = stream.shutdown().await;
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_deliver_writes_whole_record() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let transport = TcpTransport::new("127.0.0.1", port);
        transport.deliver(b"lux 0x00 42 3 1700000000\n").await.unwrap();
        assert_eq!(server.await.unwrap(), b"lux 0x00 42 3 1700000000\n");
    }

    #[tokio::test]
    async fn test_refused_connection_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = TcpTransport::new("127.0.0.1", port)
            .with_timeouts(Duration::from_millis(500), Duration::from_millis(500));
        let err = transport.deliver(b"x\n").await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::Connect { .. } | RelayError::Timeout { .. }
        ));
        assert!(transport.probe().await.is_err());
    }

    #[tokio::test]
    async fn test_probe_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let transport = TcpTransport::new("127.0.0.1", port);
        assert!(transport.probe().await.is_ok());
        assert_eq!(transport.endpoint(), format!("127.0.0.1:{}", port));
    }
}
