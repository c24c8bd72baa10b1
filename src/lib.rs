//! # Notifications Library
//!
//! Polymorphic notifications stored in one table, addressed to users, roles
//! and permissions, with per-observer read tracking.

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod events;
pub mod factory;
pub mod models;
pub mod references;
pub mod registry;
pub mod repositories;
pub mod resolver;
pub mod sti;
pub mod telemetry;
pub use migration;

pub use error::{NotificationError, Result};
pub use factory::{CreateNotification, NotificationFactory};
pub use references::{EntityRef, ObserverKind, ObserverRef};
pub use registry::{TypeRegistry, Variant};
pub use repositories::ReadFilter;
pub use resolver::ObserverResolver;
pub use sti::{Notification, NotificationStore, Scope};
