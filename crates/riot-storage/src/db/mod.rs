pub mod buffered_record;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Statement};

const CREATE_BUFFERED_RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS buffered_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    line TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

/// 创建缓冲表（幂等）
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        CREATE_BUFFERED_RECORDS.to_string(),
    ))
    .await?;
    Ok(())
}
