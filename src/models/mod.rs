//! # Data Models
//!
//! SeaORM entities for the two notification tables.

pub mod notification;
pub mod notification_observer;

pub use notification::Entity as NotificationEntity;
pub use notification_observer::Entity as NotificationObserver;
