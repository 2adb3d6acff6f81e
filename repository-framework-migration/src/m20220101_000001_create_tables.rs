use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tasks::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tasks::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Tasks::AuthorId).string_len(64))
                    .col(ColumnDef::new(Tasks::TotalMinutes).integer())
                    .col(ColumnDef::new(Tasks::Source).string_len(32))
                    .col(
                        ColumnDef::new(Tasks::Discarded)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Tasks::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Tasks::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskSteps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TaskSteps::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TaskSteps::TaskId).string_len(64).not_null())
                    .col(ColumnDef::new(TaskSteps::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(TaskSteps::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_steps_task_id")
                            .from(TaskSteps::Table, TaskSteps::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tags::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tags::Key).string_len(128).not_null())
                    .col(ColumnDef::new(Tags::Value).string_len(256).not_null())
                    .col(ColumnDef::new(Tags::AuthorId).string_len(64).not_null())
                    .col(ColumnDef::new(Tags::TagType).string_len(32).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaskTags::TaskId).string_len(64).not_null())
                    .col(ColumnDef::new(TaskTags::TagId).string_len(64).not_null())
                    .primary_key(
                        Index::create()
                            .col(TaskTags::TaskId)
                            .col(TaskTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_tags_task_id")
                            .from(TaskTags::Table, TaskTags::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_tags_tag_id")
                            .from(TaskTags::Table, TaskTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskRevisions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaskRevisions::Id).string_len(64).not_null())
                    .col(ColumnDef::new(TaskRevisions::Rev).integer().not_null())
                    .col(
                        ColumnDef::new(TaskRevisions::Name)
                            .string_len(256)
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(TaskRevisions::Id)
                            .col(TaskRevisions::Rev),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TaskRevisions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskSteps::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    Name,
    AuthorId,
    TotalMinutes,
    Source,
    Discarded,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TaskSteps {
    Table,
    Id,
    TaskId,
    Name,
    Position,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    Id,
    Key,
    Value,
    AuthorId,
    TagType,
}

#[derive(DeriveIden)]
enum TaskTags {
    Table,
    TaskId,
    TagId,
}

#[derive(DeriveIden)]
enum TaskRevisions {
    Table,
    Id,
    Rev,
    Name,
}
