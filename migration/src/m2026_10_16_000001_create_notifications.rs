//! Migration to create the notifications table.
//!
//! Every notification variant shares this table; the `type` column carries the
//! discriminator. Sender and object are polymorphic `(kind, id)` pairs and
//! `data` holds the serialized variant payload.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    // Holds the qualified variant name, or its numeric code rendered
                    // as text when the store runs with `type_format = integer`.
                    .col(ColumnDef::new(Notifications::Type).text().not_null())
                    .col(ColumnDef::new(Notifications::SenderId).uuid().null())
                    .col(ColumnDef::new(Notifications::SenderType).text().null())
                    .col(ColumnDef::new(Notifications::ObjectId).uuid().null())
                    .col(ColumnDef::new(Notifications::ObjectType).text().null())
                    .col(ColumnDef::new(Notifications::Data).text().null())
                    .col(
                        ColumnDef::new(Notifications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Notifications::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notifications_type")
                    .table(Notifications::Table)
                    .col(Notifications::Type)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_notifications_type")
                    .table(Notifications::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    Type,
    SenderId,
    SenderType,
    ObjectId,
    ObjectType,
    Data,
    CreatedAt,
    UpdatedAt,
}
