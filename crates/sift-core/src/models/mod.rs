//! Data models for Sift

mod item;
mod operation;
mod week;

pub use item::{Item, ItemDraft, ItemFields, ItemId, ItemPatch, ItemStatus, TEMP_ID_PREFIX};
pub use operation::{Operation, QueuedOp};
pub use week::WeekKey;
