//! Test utilities for database testing.
//!
//! In-memory SQLite databases with migrations applied, plus the registry and
//! service wiring shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use notifications::{
    config::{NotificationSettings, TypeFormat},
    directory::InMemoryDirectory,
    events::EventBus,
    repositories::ObserverLinkRepository,
    NotificationFactory, NotificationStore, ObserverResolver, TypeRegistry,
};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;

    Migrator::up(&db, None).await?;

    // Allow link fixtures that point at notifications the test never inserted.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = OFF".to_string(),
    ))
    .await?;

    Ok(db)
}

/// Sets up an in-memory SQLite database with all migrations applied and returns an Arc.
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    let db = setup_test_db().await?;
    Ok(Arc::new(db))
}

pub fn settings(type_format: TypeFormat, entrust: bool) -> NotificationSettings {
    NotificationSettings {
        type_format,
        namespace: "app::notifications".to_string(),
        entrust,
    }
}

/// Registry with `liked` (code 1) and `commented` (code 2).
pub fn registry(settings: &NotificationSettings) -> Result<Arc<TypeRegistry>> {
    let mut registry = TypeRegistry::new(settings);
    registry.register_named("liked", 1)?;
    registry.register_named("commented", 2)?;
    Ok(Arc::new(registry))
}

/// Fully wired services over one database.
pub struct Harness {
    pub db: Arc<DatabaseConnection>,
    pub registry: Arc<TypeRegistry>,
    pub settings: NotificationSettings,
    pub events: Arc<EventBus>,
    pub store: NotificationStore,
    pub links: ObserverLinkRepository,
    pub factory: NotificationFactory,
}

impl Harness {
    pub async fn new(type_format: TypeFormat, entrust: bool) -> Result<Self> {
        let db = setup_test_db_arc().await?;
        let settings = settings(type_format, entrust);
        let registry = registry(&settings)?;
        let events = Arc::new(EventBus::default());
        Ok(Self {
            store: NotificationStore::new(db.clone(), registry.clone()),
            links: ObserverLinkRepository::new(db.clone()),
            factory: NotificationFactory::new(db.clone(), registry.clone(), events.clone()),
            db,
            registry,
            settings,
            events,
        })
    }

    pub fn resolver(&self, directory: InMemoryDirectory) -> ObserverResolver {
        ObserverResolver::new(
            self.store.clone(),
            self.links.clone(),
            Arc::new(directory),
            &self.settings,
        )
    }
}

/// Inserts a notification row directly, bypassing discriminator stamping.
pub async fn insert_raw_notification(db: &DatabaseConnection, discriminator: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now: DateTimeWithTimeZone = Utc::now().into();
    let stmt = Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO notifications (id, type, data, created_at, updated_at) \
         VALUES (?, ?, NULL, ?, ?)",
        vec![
            Value::Uuid(Some(Box::new(id))),
            Value::String(Some(Box::new(discriminator.to_string()))),
            Value::ChronoDateTimeWithTimeZone(Some(Box::new(now))),
            Value::ChronoDateTimeWithTimeZone(Some(Box::new(now))),
        ],
    );
    db.execute(stmt).await?;
    Ok(id)
}

/// Number of rows in a table.
pub async fn count_rows(db: &DatabaseConnection, table: &str) -> Result<i64> {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await?
        .ok_or_else(|| anyhow::anyhow!("COUNT returned no row"))?;
    Ok(row.try_get("", "n")?)
}
