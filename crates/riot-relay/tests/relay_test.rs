use async_trait::async_trait;
use riot_relay::{
    BufferDrain, DrainOutcome, LinkState, NullAccessPoint, RelayError, RelayHandle, RelayQueue,
    RelaySettings, SimulatedAccessPoint, Transport,
};
use riot_storage::{MemoryBuffer, RecordBuffer};
use riot_types::{Record, RecordSink, TracingStatusReporter};
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 可控的投递通道
struct FakeTransport {
    accepting: AtomicBool,
    probe_budget: AtomicU64,
    rejected_lines: Mutex<HashSet<String>>,
    delivered: Mutex<Vec<String>>,
    attempts: AtomicU64,
}

impl FakeTransport {
    fn new(accepting: bool) -> Arc<Self> {
        Arc::new(Self {
            accepting: AtomicBool::new(accepting),
            probe_budget: AtomicU64::new(0),
            rejected_lines: Mutex::new(HashSet::new()),
            delivered: Mutex::new(Vec::new()),
            attempts: AtomicU64::new(0),
        })
    }

    fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    /// 允许接下来 `n` 次探测成功
    fn allow_probes(&self, n: u64) {
        self.probe_budget.store(n, Ordering::SeqCst);
    }

    fn reject(&self, record: &Record) {
        self.rejected_lines
            .lock()
            .unwrap()
            .insert(record.as_str().to_string());
    }

    fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

fn refused() -> RelayError {
    RelayError::Connect {
        endpoint: "fake:5000".to_string(),
        source: io::Error::from(io::ErrorKind::ConnectionRefused),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn deliver(&self, payload: &[u8]) -> riot_relay::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let line = String::from_utf8_lossy(payload).to_string();
        if !self.accepting.load(Ordering::SeqCst) || self.rejected_lines.lock().unwrap().contains(&line) {
            return Err(refused());
        }
        self.delivered.lock().unwrap().push(line);
        Ok(())
    }

    async fn probe(&self) -> riot_relay::Result<()> {
        let granted = self
            .probe_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match granted {
            Ok(_) => Ok(()),
            Err(_) => Err(refused()),
        }
    }

    fn endpoint(&self) -> &str {
        "fake:5000"
    }
}

fn record(n: u32) -> Record {
    Record::from_line(format!("lux 0x00 {} {} 1700000000\n", n * 100, n))
}

fn settings() -> RelaySettings {
    RelaySettings {
        probe_interval: Duration::from_millis(20),
        write_retry_attempts: 2,
        write_retry_delay: Duration::from_millis(1),
    }
}

async fn start(transport: Arc<FakeTransport>, buffer: Arc<MemoryBuffer>) -> RelayHandle {
    let (handle, _task) = RelayQueue::start(
        transport,
        buffer,
        Arc::new(NullAccessPoint),
        Arc::new(TracingStatusReporter),
        settings(),
    )
    .await;
    handle
}

async fn wait_for_link(handle: &RelayHandle, state: LinkState) {
    let mut rx = handle.subscribe_link();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
        .await
        .expect("link state not reached in time")
        .expect("relay stopped");
}

#[tokio::test]
async fn test_live_delivery_skips_buffer() {
    let transport = FakeTransport::new(true);
    let buffer = Arc::new(MemoryBuffer::new());
    let handle = start(transport.clone(), buffer.clone()).await;

    handle.submit(record(1));
    let stats = handle.stats().await.unwrap();

    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.buffered, 0);
    assert_eq!(transport.delivered(), vec![record(1).as_str().to_string()]);
    assert_eq!(buffer.count().await.unwrap(), 0);
    assert_eq!(handle.link_state(), LinkState::Up);
}

#[tokio::test]
async fn test_refused_delivery_buffers_and_arms_monitor() {
    let transport = FakeTransport::new(false);
    let buffer = Arc::new(MemoryBuffer::new());
    let handle = start(transport.clone(), buffer.clone()).await;

    handle.submit(record(2));
    let stats = handle.stats().await.unwrap();

    assert_eq!(handle.link_state(), LinkState::Down);
    assert_eq!(buffer.snapshot().await, vec![record(2)]);
    assert_eq!(stats.monitor_arms, 1);
    assert_eq!(stats.link, Some(LinkState::Down));
}

#[tokio::test]
async fn test_down_link_buffers_without_network_attempt() {
    let transport = FakeTransport::new(false);
    let buffer = Arc::new(MemoryBuffer::new());
    let handle = start(transport.clone(), buffer.clone()).await;

    for n in 1..=4 {
        handle.submit(record(n));
    }
    let stats = handle.stats().await.unwrap();

    // 只有第一条尝试过网络
    assert_eq!(transport.attempts(), 1);
    assert_eq!(stats.buffered, 4);
    assert_eq!(
        buffer.snapshot().await,
        vec![record(1), record(2), record(3), record(4)]
    );
    // 重复失败不会启动第二个探测循环
    assert_eq!(stats.monitor_arms, 1);
}

#[tokio::test]
async fn test_probe_success_drains_buffer() {
    let transport = FakeTransport::new(false);
    let buffer = Arc::new(MemoryBuffer::new());
    let handle = start(transport.clone(), buffer.clone()).await;

    handle.submit(record(2));
    wait_for_link(&handle, LinkState::Down).await;

    transport.set_accepting(true);
    transport.allow_probes(u64::MAX);
    wait_for_link(&handle, LinkState::Up).await;
    let stats = handle.stats().await.unwrap();

    assert_eq!(buffer.count().await.unwrap(), 0);
    assert_eq!(stats.drained, 1);
    assert_eq!(handle.link_state(), LinkState::Up);
    assert_eq!(transport.delivered(), vec![record(2).as_str().to_string()]);
}

#[tokio::test]
async fn test_drain_failure_keeps_remaining_entries() {
    let transport = FakeTransport::new(false);
    let buffer = Arc::new(MemoryBuffer::new());
    let handle = start(transport.clone(), buffer.clone()).await;

    handle.submit(record(3));
    handle.submit(record(4));
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.monitor_arms, 1);

    transport.set_accepting(true);
    transport.reject(&record(4));
    transport.allow_probes(1);

    let mut link = handle.subscribe_link();
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.stats().await.unwrap().monitor_arms < 2 {
            let _ = tokio::time::timeout(Duration::from_millis(10), link.changed()).await;
        }
    })
    .await
    .expect("monitor was not re-armed");

    let stats = handle.stats().await.unwrap();
    assert_eq!(transport.delivered(), vec![record(3).as_str().to_string()]);
    assert_eq!(buffer.snapshot().await, vec![record(4)]);
    assert_eq!(handle.link_state(), LinkState::Down);
    assert_eq!(stats.drained, 1);
    assert_eq!(stats.monitor_arms, 2);
}

#[tokio::test]
async fn test_submissions_during_recovery_stay_behind_buffered_records() {
    let transport = FakeTransport::new(false);
    let buffer = Arc::new(MemoryBuffer::new());
    let handle = start(transport.clone(), buffer.clone()).await;

    handle.submit(record(1));
    handle.submit(record(2));
    handle.stats().await.unwrap();

    transport.set_accepting(true);
    transport.allow_probes(u64::MAX);
    handle.submit(record(3));
    wait_for_link(&handle, LinkState::Up).await;
    handle.submit(record(4));
    handle.stats().await.unwrap();

    let expected: Vec<String> = (1..=4).map(|n| record(n).as_str().to_string()).collect();
    assert_eq!(transport.delivered(), expected);
    assert_eq!(buffer.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_buffer_write_failure_is_retried() {
    let transport = FakeTransport::new(false);
    let buffer = Arc::new(MemoryBuffer::new());
    buffer.fail_next_appends(1);
    let handle = start(transport.clone(), buffer.clone()).await;

    handle.submit(record(1));
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.buffered, 1);
    assert_eq!(stats.spilled, 0);
    assert_eq!(buffer.snapshot().await, vec![record(1)]);
}

#[tokio::test]
async fn test_unwritable_buffer_parks_records_in_order() {
    let transport = FakeTransport::new(false);
    let buffer = Arc::new(MemoryBuffer::new());
    // 两次重试都失败，再让下一次写回也失败
    buffer.fail_next_appends(3);
    let handle = start(transport.clone(), buffer.clone()).await;

    handle.submit(record(1));
    handle.submit(record(2));
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.spilled, 2);
    assert!(buffer.snapshot().await.is_empty());

    handle.submit(record(3));
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.spilled, 0);
    assert_eq!(
        buffer.snapshot().await,
        vec![record(1), record(2), record(3)]
    );
}

#[tokio::test]
async fn test_leftover_records_drained_after_restart() {
    let transport = FakeTransport::new(true);
    transport.allow_probes(u64::MAX);
    let buffer = Arc::new(MemoryBuffer::new());
    buffer.append(&record(7)).await.unwrap();

    let handle = start(transport.clone(), buffer.clone()).await;
    assert_eq!(handle.link_state(), LinkState::Down);

    wait_for_link(&handle, LinkState::Up).await;
    handle.stats().await.unwrap();
    assert_eq!(buffer.count().await.unwrap(), 0);
    assert_eq!(transport.delivered(), vec![record(7).as_str().to_string()]);
}

#[tokio::test]
async fn test_failed_probe_reassociates_access_point() {
    let transport = FakeTransport::new(false);
    let buffer = Arc::new(MemoryBuffer::new());
    let access_point = Arc::new(SimulatedAccessPoint::new(
        "riot-waikato-*",
        vec!["riot-waikato-LAB".to_string()],
    ));
    let (handle, _task) = RelayQueue::start(
        transport.clone(),
        buffer,
        access_point.clone(),
        Arc::new(TracingStatusReporter),
        settings(),
    )
    .await;

    handle.submit(record(1));
    tokio::time::timeout(Duration::from_secs(5), async {
        while access_point.attempts() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("access point was not consulted");
    assert_eq!(access_point.current_ssid().as_deref(), Some("riot-waikato-LAB"));
}

#[tokio::test]
async fn test_close_processes_queued_records() {
    let transport = FakeTransport::new(true);
    let buffer = Arc::new(MemoryBuffer::new());
    let handle = start(transport.clone(), buffer).await;

    handle.submit(record(1));
    handle.submit(record(2));
    let stats = handle.close().await.unwrap();
    assert_eq!(stats.delivered, 2);
    assert!(matches!(handle.relay(record(3)), Err(RelayError::Closed)));
}

#[tokio::test]
async fn test_drain_stops_at_first_failure() {
    let transport = FakeTransport::new(true);
    let buffer = MemoryBuffer::new();
    for n in 1..=3 {
        buffer.append(&record(n)).await.unwrap();
    }
    transport.reject(&record(2));

    let outcome = BufferDrain::new(&buffer, transport.as_ref()).run().await;
    assert!(matches!(outcome, DrainOutcome::Interrupted { delivered: 1, .. }));
    assert_eq!(buffer.snapshot().await, vec![record(2), record(3)]);

    transport.rejected_lines.lock().unwrap().clear();
    let outcome = BufferDrain::new(&buffer, transport.as_ref()).run().await;
    assert!(outcome.is_completed());
    assert_eq!(outcome.delivered(), 2);
    let expected: Vec<String> = (1..=3).map(|n| record(n).as_str().to_string()).collect();
    assert_eq!(transport.delivered(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_probes_repeat_at_interval_until_endpoint_returns() {
    let transport = FakeTransport::new(false);
    let buffer = Arc::new(MemoryBuffer::new());
    let handle = start(transport.clone(), buffer.clone()).await;

    handle.submit(record(1));
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.probes, 0);

    // 探测间隔 20ms：第 20、40、60ms 各探测一次
    tokio::time::sleep(Duration::from_millis(70)).await;
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.probes, 3);
    assert_eq!(stats.monitor_arms, 1);
    assert_eq!(handle.link_state(), LinkState::Down);
    assert_eq!(buffer.count().await.unwrap(), 1);

    transport.set_accepting(true);
    transport.allow_probes(1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.probes, 4);
    assert_eq!(stats.drained, 1);
    assert_eq!(handle.link_state(), LinkState::Up);
    assert_eq!(buffer.count().await.unwrap(), 0);
}
