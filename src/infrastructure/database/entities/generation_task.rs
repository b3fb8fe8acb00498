// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "generation_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub status: String,
    pub current_step: i32,
    pub total_steps: i32,
    pub style_source: Json,
    pub product_image_key: String,
    pub user_metadata: Option<Json>,
    pub model_selector: String,
    pub style_analysis: Option<Json>,
    pub content_analysis: Option<Json>,
    #[sea_orm(column_type = "Text", nullable)]
    pub generated_prompt: Option<String>,
    pub result_images: Json,
    pub failed_step: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub model_trace: Option<Json>,
    pub batch_id: Option<Uuid>,
    pub batch_index: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub metered_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub fixed_cost: Decimal,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
    pub completed_at: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::batch_task::Entity",
        from = "Column::BatchId",
        to = "super::batch_task::Column::Id"
    )]
    BatchTask,
    #[sea_orm(has_many = "super::cost_entry::Entity")]
    CostEntry,
}

impl Related<super::batch_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchTask.def()
    }
}

impl Related<super::cost_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CostEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
