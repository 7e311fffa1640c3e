//! Sync engine and connectivity monitoring

mod connectivity;
mod engine;

pub use connectivity::ConnectivityMonitor;
pub use engine::{DrainReport, SyncEngine, SyncReport};
