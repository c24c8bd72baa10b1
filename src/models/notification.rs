//! Notification entity model
//!
//! Raw row shape of the `notifications` table. Rows of every variant share
//! this table; the `type` column is the discriminator. Code outside the STI
//! layer works with materialized [`crate::sti::Notification`] values instead.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Variant discriminator
    pub r#type: String,

    pub sender_id: Option<Uuid>,
    pub sender_type: Option<String>,

    /// Subject reference, stored under the `object_*` columns
    pub object_id: Option<Uuid>,
    pub object_type: Option<String>,

    /// Serialized JSON payload
    #[sea_orm(column_type = "Text", nullable)]
    pub data: Option<String>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::notification_observer::Entity")]
    Observers,
}

impl Related<super::notification_observer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Observers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
