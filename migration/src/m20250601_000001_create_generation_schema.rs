// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BatchTasks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BatchTasks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(BatchTasks::Status).string().not_null())
                    .col(ColumnDef::new(BatchTasks::StyleSource).json_binary().not_null())
                    .col(ColumnDef::new(BatchTasks::TotalCount).integer().not_null())
                    .col(
                        ColumnDef::new(BatchTasks::CompletedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BatchTasks::FailedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(BatchTasks::SharedAnalysis).json_binary())
                    .col(ColumnDef::new(BatchTasks::SharedAnalysisModel).string())
                    .col(
                        ColumnDef::new(BatchTasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BatchTasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(BatchTasks::CompletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GenerationTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GenerationTasks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GenerationTasks::Status).string().not_null())
                    .col(
                        ColumnDef::new(GenerationTasks::CurrentStep)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GenerationTasks::TotalSteps)
                            .integer()
                            .not_null()
                            .default(4),
                    )
                    .col(
                        ColumnDef::new(GenerationTasks::StyleSource)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GenerationTasks::ProductImageKey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GenerationTasks::UserMetadata).json_binary())
                    .col(
                        ColumnDef::new(GenerationTasks::ModelSelector)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GenerationTasks::StyleAnalysis).json_binary())
                    .col(ColumnDef::new(GenerationTasks::ContentAnalysis).json_binary())
                    .col(ColumnDef::new(GenerationTasks::GeneratedPrompt).text())
                    .col(
                        ColumnDef::new(GenerationTasks::ResultImages)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GenerationTasks::FailedStep).integer())
                    .col(ColumnDef::new(GenerationTasks::ErrorMessage).text())
                    .col(ColumnDef::new(GenerationTasks::ModelTrace).json_binary())
                    .col(ColumnDef::new(GenerationTasks::BatchId).uuid())
                    .col(ColumnDef::new(GenerationTasks::BatchIndex).integer())
                    .col(
                        ColumnDef::new(GenerationTasks::MeteredCost)
                            .decimal_len(20, 6)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GenerationTasks::FixedCost)
                            .decimal_len(20, 6)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GenerationTasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(GenerationTasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(GenerationTasks::CompletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_generation_tasks_batch")
                            .from(GenerationTasks::Table, GenerationTasks::BatchId)
                            .to(BatchTasks::Table, BatchTasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CostEntries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CostEntries::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CostEntries::TaskId).uuid().not_null())
                    .col(ColumnDef::new(CostEntries::Stage).integer().not_null())
                    .col(ColumnDef::new(CostEntries::CallId).string().not_null())
                    .col(
                        ColumnDef::new(CostEntries::Amount)
                            .decimal_len(20, 6)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CostEntries::Currency).string().not_null())
                    .col(ColumnDef::new(CostEntries::PromptTokens).big_integer())
                    .col(ColumnDef::new(CostEntries::CompletionTokens).big_integer())
                    .col(ColumnDef::new(CostEntries::LatencyMs).big_integer())
                    .col(
                        ColumnDef::new(CostEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cost_entries_task")
                            .from(CostEntries::Table, CostEntries::TaskId)
                            .to(GenerationTasks::Table, GenerationTasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_generation_tasks_batch_status")
                    .table(GenerationTasks::Table)
                    .col(GenerationTasks::BatchId)
                    .col(GenerationTasks::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cost_entries_task_id")
                    .table(CostEntries::Table)
                    .col(CostEntries::TaskId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CostEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GenerationTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BatchTasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BatchTasks {
    Table,
    Id,
    Status,
    StyleSource,
    TotalCount,
    CompletedCount,
    FailedCount,
    SharedAnalysis,
    SharedAnalysisModel,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum GenerationTasks {
    Table,
    Id,
    Status,
    CurrentStep,
    TotalSteps,
    StyleSource,
    ProductImageKey,
    UserMetadata,
    ModelSelector,
    StyleAnalysis,
    ContentAnalysis,
    GeneratedPrompt,
    ResultImages,
    FailedStep,
    ErrorMessage,
    ModelTrace,
    BatchId,
    BatchIndex,
    MeteredCost,
    FixedCost,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum CostEntries {
    Table,
    Id,
    TaskId,
    Stage,
    CallId,
    Amount,
    Currency,
    PromptTokens,
    CompletionTokens,
    LatencyMs,
    CreatedAt,
}
