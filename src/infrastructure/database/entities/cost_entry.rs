// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cost_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub task_id: Uuid,
    pub stage: i32,
    pub call_id: String,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub amount: Decimal,
    pub currency: String,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub latency_ms: Option<i64>,
    pub created_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::generation_task::Entity",
        from = "Column::TaskId",
        to = "super::generation_task::Column::Id"
    )]
    GenerationTask,
}

impl Related<super::generation_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GenerationTask.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
