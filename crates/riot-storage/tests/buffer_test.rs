use riot_storage::{RecordBuffer, SqliteBuffer};
use riot_types::Record;
use tempfile::TempDir;

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("nested/buffer.db").display())
}

fn record(n: u32) -> Record {
    Record::from_line(format!("lux 0x00 {} {} 1700000000\n", n * 10, n))
}

#[tokio::test]
async fn test_buffer_is_fifo() {
    let dir = TempDir::new().unwrap();
    let buffer = SqliteBuffer::connect(&database_url(&dir)).await.unwrap();

    for n in 1..=3 {
        buffer.append(&record(n)).await.unwrap();
    }
    assert_eq!(buffer.count().await.unwrap(), 3);

    let mut drained = Vec::new();
    while let Some(entry) = buffer.peek_oldest().await.unwrap() {
        assert!(buffer.remove_oldest(&entry).await.unwrap());
        drained.push(entry.record);
    }
    assert_eq!(drained, vec![record(1), record(2), record(3)]);
    assert_eq!(buffer.stats().appended, 3);
    assert_eq!(buffer.stats().removed, 3);
}

#[tokio::test]
async fn test_buffer_survives_restart() {
    let dir = TempDir::new().unwrap();
    let url = database_url(&dir);

    {
        let buffer = SqliteBuffer::connect(&url).await.unwrap();
        buffer.append(&record(1)).await.unwrap();
        buffer.append(&record(2)).await.unwrap();
        buffer.connection().clone().close().await.unwrap();
    }

    let reopened = SqliteBuffer::connect(&url).await.unwrap();
    assert_eq!(reopened.count().await.unwrap(), 2);
    let oldest = reopened.peek_oldest().await.unwrap().unwrap();
    assert_eq!(oldest.record, record(1));

    // 重启后新写入的记录排在旧记录之后
    reopened.append(&record(3)).await.unwrap();
    assert!(reopened.remove_oldest(&oldest).await.unwrap());
    let next = reopened.peek_oldest().await.unwrap().unwrap();
    assert_eq!(next.record, record(2));
}

#[tokio::test]
async fn test_remove_only_the_oldest() {
    let dir = TempDir::new().unwrap();
    let buffer = SqliteBuffer::connect(&database_url(&dir)).await.unwrap();

    buffer.append(&record(1)).await.unwrap();
    let first = buffer.peek_oldest().await.unwrap().unwrap();
    buffer.append(&record(2)).await.unwrap();

    assert!(buffer.remove_oldest(&first).await.unwrap());
    // 同一条目不能被删除两次
    assert!(!buffer.remove_oldest(&first).await.unwrap());
    assert_eq!(buffer.count().await.unwrap(), 1);
}
