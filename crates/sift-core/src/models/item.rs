//! Item model

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::WeekKey;
use crate::util::normalize_text_option;

/// Prefix marking client-generated identifiers not yet confirmed by the
/// remote store.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// A unique identifier for an item.
///
/// Either a temporary id (client-generated, `temp-` prefix) or a permanent
/// id assigned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a fresh temporary id.
    ///
    /// UUIDv7 combines a time component with a random component, so ids are
    /// distinct across a single device's lifetime.
    #[must_use]
    pub fn temp() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7()))
    }

    /// Whether this id is still pending creation on the remote store.
    #[must_use]
    pub fn is_temp(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    /// Get the string representation of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Archived,
    /// Soft-delete marker; the record stays until the delete is reconciled.
    Deleted,
}

impl ItemStatus {
    /// TEXT encoding used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }

    /// Parse the TEXT encoding.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One captured note/link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub url: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub status: ItemStatus,
    /// Monday of the week this item belongs to, frozen at creation time.
    pub week_of: WeekKey,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// True only when id and fields are known to match the remote store.
    #[serde(default)]
    pub synced: bool,
}

impl Item {
    /// Build the optimistic local record for a new, unconfirmed item.
    #[must_use]
    pub fn optimistic(id: ItemId, fields: &ItemFields, now: i64) -> Self {
        Self {
            id,
            url: fields.url.clone(),
            title: fields.title.clone(),
            notes: fields.notes.clone(),
            category: fields.category.clone(),
            status: ItemStatus::Active,
            week_of: fields.week_of,
            created_at: now,
            updated_at: now,
            synced: false,
        }
    }

    /// Merge a patch into this record and mark it pending confirmation.
    pub fn apply_patch(&mut self, patch: &ItemPatch, now: i64) {
        patch.apply_to(self);
        self.updated_at = now;
        self.synced = false;
    }

    /// Soft-delete this record pending remote confirmation.
    pub fn soft_delete(&mut self, now: i64) {
        self.status = ItemStatus::Deleted;
        self.updated_at = now;
        self.synced = false;
    }

    /// Archive this record pending remote confirmation.
    pub fn archive(&mut self, now: i64) {
        self.status = ItemStatus::Archived;
        self.updated_at = now;
        self.synced = false;
    }

    /// Mark this record as confirmed by the remote store.
    #[must_use]
    pub fn into_synced(mut self) -> Self {
        self.synced = true;
        self
    }
}

/// Caller-supplied fields for a new item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub url: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
}

impl ItemDraft {
    /// Normalize and validate the draft into a create payload with the week
    /// key frozen in.
    ///
    /// At least one of `url`/`notes` must be present after trimming.
    pub fn into_fields(self, week_of: WeekKey) -> Result<ItemFields> {
        let fields = ItemFields {
            url: normalize_text_option(self.url),
            title: normalize_text_option(self.title),
            notes: normalize_text_option(self.notes),
            category: normalize_text_option(self.category),
            week_of,
        };
        if fields.url.is_none() && fields.notes.is_none() {
            return Err(Error::Validation(
                "an item needs a url or some notes".to_string(),
            ));
        }
        Ok(fields)
    }
}

/// Full field set sent with a create, with `week_of` frozen at creation time
/// so a later replay cannot land the item in the wrong week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFields {
    pub url: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub week_of: WeekKey,
}

impl ItemFields {
    /// Snapshot the current field values of a local record.
    ///
    /// Used when an update folds into a pending create.
    #[must_use]
    pub fn of(item: &Item) -> Self {
        Self {
            url: item.url.clone(),
            title: item.title.clone(),
            notes: item.notes.clone(),
            category: item.category.clone(),
            week_of: item.week_of,
        }
    }
}

/// Changed fields for an update.
///
/// `None` leaves a field untouched; a whitespace-only value clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ItemPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.title.is_none()
            && self.notes.is_none()
            && self.category.is_none()
    }

    fn apply_to(&self, item: &mut Item) {
        if let Some(url) = &self.url {
            item.url = normalize_text_option(Some(url.clone()));
        }
        if let Some(title) = &self.title {
            item.title = normalize_text_option(Some(title.clone()));
        }
        if let Some(notes) = &self.notes {
            item.notes = normalize_text_option(Some(notes.clone()));
        }
        if let Some(category) = &self.category {
            item.category = normalize_text_option(Some(category.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn week() -> WeekKey {
        "2024-06-03".parse().unwrap()
    }

    #[test]
    fn temp_ids_are_prefixed_and_unique() {
        let a = ItemId::temp();
        let b = ItemId::temp();
        assert!(a.is_temp());
        assert!(a.as_str().starts_with(TEMP_ID_PREFIX));
        assert_ne!(a, b);
    }

    #[test]
    fn permanent_ids_are_not_temp() {
        assert!(!ItemId::from("item-42").is_temp());
    }

    #[test]
    fn draft_requires_url_or_notes() {
        let draft = ItemDraft {
            title: Some("just a title".to_string()),
            ..ItemDraft::default()
        };
        assert!(matches!(
            draft.into_fields(week()),
            Err(Error::Validation(_))
        ));

        let draft = ItemDraft {
            url: Some("https://example.com".to_string()),
            ..ItemDraft::default()
        };
        assert!(draft.into_fields(week()).is_ok());

        let draft = ItemDraft {
            notes: Some("worth keeping".to_string()),
            ..ItemDraft::default()
        };
        assert!(draft.into_fields(week()).is_ok());
    }

    #[test]
    fn draft_normalizes_whitespace() {
        let draft = ItemDraft {
            url: Some("  https://example.com  ".to_string()),
            title: Some("   ".to_string()),
            ..ItemDraft::default()
        };
        let fields = draft.into_fields(week()).unwrap();
        assert_eq!(fields.url.as_deref(), Some("https://example.com"));
        assert_eq!(fields.title, None);
    }

    #[test]
    fn patch_merges_and_clears_fields() {
        let fields = ItemDraft {
            url: Some("https://example.com".to_string()),
            title: Some("old title".to_string()),
            ..ItemDraft::default()
        }
        .into_fields(week())
        .unwrap();
        let mut item = Item::optimistic(ItemId::temp(), &fields, 1_000);

        let patch = ItemPatch {
            title: Some("new title".to_string()),
            notes: Some("now with notes".to_string()),
            category: Some("  ".to_string()),
            ..ItemPatch::default()
        };
        item.apply_patch(&patch, 2_000);

        assert_eq!(item.url.as_deref(), Some("https://example.com"));
        assert_eq!(item.title.as_deref(), Some("new title"));
        assert_eq!(item.notes.as_deref(), Some("now with notes"));
        assert_eq!(item.category, None);
        assert_eq!(item.updated_at, 2_000);
        assert!(!item.synced);
    }

    #[test]
    fn status_text_roundtrip() {
        for status in [ItemStatus::Active, ItemStatus::Archived, ItemStatus::Deleted] {
            assert_eq!(ItemStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ItemStatus::parse("purged"), None);
    }

    #[test]
    fn fields_of_item_snapshots_current_values() {
        let fields = ItemDraft {
            notes: Some("first".to_string()),
            ..ItemDraft::default()
        }
        .into_fields(week())
        .unwrap();
        let mut item = Item::optimistic(ItemId::temp(), &fields, 1_000);
        item.apply_patch(
            &ItemPatch {
                notes: Some("second".to_string()),
                ..ItemPatch::default()
            },
            2_000,
        );

        let snapshot = ItemFields::of(&item);
        assert_eq!(snapshot.notes.as_deref(), Some("second"));
        assert_eq!(snapshot.week_of, week());
    }
}
