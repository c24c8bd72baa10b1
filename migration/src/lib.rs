//! Database migrations for the notifications store.
//!
//! Creates the single-table-inheritance `notifications` table and the
//! polymorphic `notification_observer` link table.

pub use sea_orm_migration::prelude::*;

mod m2026_10_16_000001_create_notifications;
mod m2026_10_16_000002_create_notification_observer;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_10_16_000001_create_notifications::Migration),
            Box::new(m2026_10_16_000002_create_notification_observer::Migration),
        ]
    }
}
