// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "batch_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub status: String,
    pub style_source: Json,
    pub total_count: i32,
    pub completed_count: i32,
    pub failed_count: i32,
    pub shared_analysis: Option<Json>,
    pub shared_analysis_model: Option<String>,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
    pub completed_at: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::generation_task::Entity")]
    GenerationTask,
}

impl Related<super::generation_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GenerationTask.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
