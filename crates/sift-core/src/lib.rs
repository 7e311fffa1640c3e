//! sift-core - Core library for Sift
//!
//! This crate contains the offline item store, the durable operation queue,
//! and the sync engine that reconciles local mutations with the remote item
//! service. All Sift clients build on it.

pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Item, ItemDraft, ItemId, ItemPatch, ItemStatus, WeekKey};
pub use sync::{ConnectivityMonitor, DrainReport, SyncEngine, SyncReport};
