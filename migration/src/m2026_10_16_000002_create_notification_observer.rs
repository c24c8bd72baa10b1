//! Migration to create the notification_observer link table.
//!
//! One row per (notification, observer) grant. `read_at` tracks the read
//! receipt and `deleted_at` soft-deletes the grant while keeping the row.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationObserver::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationObserver::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NotificationObserver::NotificationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationObserver::ObserverId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationObserver::ObserverType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationObserver::ReadAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(NotificationObserver::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(NotificationObserver::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(NotificationObserver::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_observer_notification_id")
                            .from(
                                NotificationObserver::Table,
                                NotificationObserver::NotificationId,
                            )
                            .to(Notifications::Table, Notifications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Attach and mark-read upsert against this key.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_notification_observer_link")
                    .table(NotificationObserver::Table)
                    .col(NotificationObserver::NotificationId)
                    .col(NotificationObserver::ObserverType)
                    .col(NotificationObserver::ObserverId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notification_observer_observer")
                    .table(NotificationObserver::Table)
                    .col(NotificationObserver::ObserverType)
                    .col(NotificationObserver::ObserverId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_notification_observer_observer")
                    .table(NotificationObserver::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("uq_notification_observer_link")
                    .table(NotificationObserver::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(NotificationObserver::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NotificationObserver {
    Table,
    Id,
    NotificationId,
    ObserverId,
    ObserverType,
    ReadAt,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
}
