use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// 待投递记录
///
/// 只保存已经序列化好的整行，与传感器类型无关。自增主键即插入顺序。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "buffered_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub line: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
