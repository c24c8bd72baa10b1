//! # Repository Layer
//!
//! Repositories wrapping SeaORM access to the observer link table.

pub mod observer;

pub use observer::{ObserverLinkRepository, ObserverLinkView, ReadFilter};
