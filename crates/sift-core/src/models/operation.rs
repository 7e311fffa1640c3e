//! Queued operation model
//!
//! One variant per mutation type, each carrying exactly the fields its
//! replay needs. Payloads are persisted as tagged JSON in the queue table.

use serde::{Deserialize, Serialize};

use crate::models::{ItemFields, ItemId, ItemPatch, WeekKey};

/// A pending mutation not yet confirmed by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    /// Create the item this temporary id stands for.
    ///
    /// Carries the full field set; `week_of` inside the fields was frozen at
    /// creation time.
    Create { temp_id: ItemId, fields: ItemFields },
    /// Push changed fields for an existing item.
    Update { id: ItemId, patch: ItemPatch },
    /// Soft-delete by permanent id.
    Delete { id: ItemId },
    /// Bulk-archive the active items of the captured week.
    Archive { week_of: WeekKey },
}

impl Operation {
    /// Stable TEXT tag stored alongside the payload.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Archive { .. } => "archive",
        }
    }

    /// The id (or week key) this operation targets, used for queue surgery.
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::Create { temp_id, .. } => temp_id.to_string(),
            Self::Update { id, .. } | Self::Delete { id } => id.to_string(),
            Self::Archive { week_of } => week_of.to_string(),
        }
    }
}

/// Queue row wrapper around an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedOp {
    /// Monotonically increasing sequence number; authoritative replay order.
    pub queue_id: i64,
    pub op: Operation,
    /// Enqueue time (Unix ms); debugging aid only.
    pub timestamp: i64,
}
