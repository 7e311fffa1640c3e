//! Local durable store for items and the operation queue

use std::sync::Arc;

use libsql::Connection;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{Item, ItemFields, ItemId, ItemStatus, Operation, QueuedOp};
use crate::util::now_millis;

use super::Database;

/// Trait for item and queue storage operations (async)
///
/// Implementations must survive process restarts and serialize their own
/// writes so `reconcile`/`replace_all` are atomic with respect to reads
/// issued from other tasks on the same process.
#[allow(async_fn_in_trait)]
pub trait ItemStore {
    /// Insert or overwrite an item by id
    async fn put(&self, item: &Item) -> Result<()>;

    /// Get an item by id; absence is a valid outcome, not an error
    async fn get(&self, id: &ItemId) -> Result<Option<Item>>;

    /// Snapshot of all items with the given status, newest first
    /// (ties broken by insertion order)
    async fn list_by_status(&self, status: ItemStatus) -> Result<Vec<Item>>;

    /// Remove an item; deleting a missing id is not an error
    async fn delete(&self, id: &ItemId) -> Result<()>;

    /// Atomically remove the temp-id record and insert the confirmed record
    /// marked synced; no window where both or neither exist
    async fn reconcile(&self, temp_id: &ItemId, permanent: &Item) -> Result<()>;

    /// Atomically clear all items and insert the given set, all marked synced
    async fn replace_all(&self, items: &[Item]) -> Result<()>;

    /// Append an operation durably; returns the assigned queue id
    async fn enqueue(&self, op: &Operation) -> Result<i64>;

    /// All pending operations in ascending queue-id order
    async fn list_queue(&self) -> Result<Vec<QueuedOp>>;

    /// The pending operation with the lowest queue id
    async fn first_queued(&self) -> Result<Option<QueuedOp>>;

    /// Remove one operation; removing a missing id is not an error
    async fn dequeue(&self, queue_id: i64) -> Result<()>;

    /// Number of pending operations
    async fn queue_len(&self) -> Result<usize>;

    /// Swap the payload of the pending create for `temp_id` in place,
    /// keeping its queue position. Returns false when no such create exists.
    async fn replace_queued_create(&self, temp_id: &ItemId, fields: &ItemFields) -> Result<bool>;

    /// Drop every pending operation targeting the given id or week key
    async fn cancel_ops_for(&self, target: &str) -> Result<()>;

    /// Retarget pending update/delete operations from a resolved temporary id
    /// to its permanent id. Returns the number of rewritten operations.
    async fn rewrite_queue_target(&self, old_id: &ItemId, new_id: &ItemId) -> Result<usize>;
}

/// libSQL implementation of [`ItemStore`]
///
/// Cloneable handle; all writes go through one connection behind a mutex, so
/// transactional operations are atomic with respect to concurrent readers.
#[derive(Clone)]
pub struct LibSqlItemStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlItemStore {
    /// Wrap an opened database
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Parse an item from a database row
    fn parse_item(row: &libsql::Row) -> Result<Item> {
        let id: String = row.get(0)?;
        let status: String = row.get(5)?;
        let week: String = row.get(6)?;
        Ok(Item {
            id: ItemId::from(id),
            url: row.get(1)?,
            title: row.get(2)?,
            notes: row.get(3)?,
            category: row.get(4)?,
            status: ItemStatus::parse(&status)
                .ok_or_else(|| Error::Storage(format!("unknown item status: {status}")))?,
            week_of: week
                .parse()
                .map_err(|_| Error::Storage(format!("invalid week key: {week}")))?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            synced: row.get::<i32>(9)? != 0,
        })
    }

    /// Parse a queue row
    fn parse_queued(row: &libsql::Row) -> Result<QueuedOp> {
        let payload: String = row.get(1)?;
        Ok(QueuedOp {
            queue_id: row.get(0)?,
            op: serde_json::from_str(&payload)?,
            timestamp: row.get(2)?,
        })
    }

    async fn insert_item(conn: &Connection, item: &Item, synced: bool) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO items
                (id, url, title, notes, category, status, week_of, created_at, updated_at, synced)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            libsql::params![
                item.id.as_str(),
                item.url.clone(),
                item.title.clone(),
                item.notes.clone(),
                item.category.clone(),
                item.status.as_str(),
                item.week_of.to_string(),
                item.created_at,
                item.updated_at,
                i32::from(synced)
            ],
        )
        .await?;
        Ok(())
    }

    /// Commit on success, roll back on failure
    async fn finish_tx<T>(conn: &Connection, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                if let Err(e) = conn.execute("COMMIT", ()).await {
                    conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }

    async fn reconcile_in_tx(conn: &Connection, temp_id: &ItemId, permanent: &Item) -> Result<()> {
        if temp_id != &permanent.id {
            conn.execute(
                "DELETE FROM items WHERE id = ?",
                libsql::params![temp_id.as_str()],
            )
            .await?;
        }
        Self::insert_item(conn, permanent, true).await
    }

    async fn replace_all_in_tx(conn: &Connection, items: &[Item]) -> Result<()> {
        conn.execute("DELETE FROM items", ()).await?;
        for item in items {
            Self::insert_item(conn, item, true).await?;
        }
        Ok(())
    }

    async fn rewrite_in_tx(
        conn: &Connection,
        pending: Vec<(i64, Operation)>,
        new_id: &ItemId,
    ) -> Result<usize> {
        let mut rewritten = 0;
        for (queue_id, op) in pending {
            let retargeted = match op {
                Operation::Update { patch, .. } => Operation::Update {
                    id: new_id.clone(),
                    patch,
                },
                Operation::Delete { .. } => Operation::Delete { id: new_id.clone() },
                // A create *defines* its temp id and archives target a week;
                // neither is retargeted.
                Operation::Create { .. } | Operation::Archive { .. } => continue,
            };
            conn.execute(
                "UPDATE queue SET target = ?, payload = ? WHERE queue_id = ?",
                libsql::params![
                    new_id.as_str(),
                    serde_json::to_string(&retargeted)?,
                    queue_id
                ],
            )
            .await?;
            rewritten += 1;
        }
        Ok(rewritten)
    }
}

impl ItemStore for LibSqlItemStore {
    async fn put(&self, item: &Item) -> Result<()> {
        if item.id.as_str().is_empty() {
            return Err(Error::Validation("item id must not be empty".to_string()));
        }
        let db = self.db.lock().await;
        Self::insert_item(db.connection(), item, item.synced).await
    }

    async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT id, url, title, notes, category, status, week_of,
                        created_at, updated_at, synced
                 FROM items WHERE id = ?",
                libsql::params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_item(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_by_status(&self, status: ItemStatus) -> Result<Vec<Item>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT id, url, title, notes, category, status, week_of,
                        created_at, updated_at, synced
                 FROM items
                 WHERE status = ?
                 ORDER BY created_at DESC, rowid ASC",
                libsql::params![status.as_str()],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::parse_item(&row)?);
        }
        Ok(items)
    }

    async fn delete(&self, id: &ItemId) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "DELETE FROM items WHERE id = ?",
                libsql::params![id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn reconcile(&self, temp_id: &ItemId, permanent: &Item) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = Self::reconcile_in_tx(conn, temp_id, permanent).await;
        Self::finish_tx(conn, result).await
    }

    async fn replace_all(&self, items: &[Item]) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = Self::replace_all_in_tx(conn, items).await;
        Self::finish_tx(conn, result).await
    }

    async fn enqueue(&self, op: &Operation) -> Result<i64> {
        let payload = serde_json::to_string(op)?;
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO queue (op_type, target, payload, created_at) VALUES (?, ?, ?, ?)",
            libsql::params![op.kind(), op.target(), payload, now_millis()],
        )
        .await?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_queue(&self) -> Result<Vec<QueuedOp>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT queue_id, payload, created_at FROM queue ORDER BY queue_id ASC",
                (),
            )
            .await?;

        let mut ops = Vec::new();
        while let Some(row) = rows.next().await? {
            ops.push(Self::parse_queued(&row)?);
        }
        Ok(ops)
    }

    async fn first_queued(&self) -> Result<Option<QueuedOp>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT queue_id, payload, created_at FROM queue ORDER BY queue_id ASC LIMIT 1",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_queued(&row)?)),
            None => Ok(None),
        }
    }

    async fn dequeue(&self, queue_id: i64) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "DELETE FROM queue WHERE queue_id = ?",
                libsql::params![queue_id],
            )
            .await?;
        Ok(())
    }

    async fn queue_len(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM queue", ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Storage("queue length overflow".to_string()))
    }

    async fn replace_queued_create(&self, temp_id: &ItemId, fields: &ItemFields) -> Result<bool> {
        let op = Operation::Create {
            temp_id: temp_id.clone(),
            fields: fields.clone(),
        };
        let payload = serde_json::to_string(&op)?;
        let db = self.db.lock().await;
        let affected = db
            .connection()
            .execute(
                "UPDATE queue SET payload = ? WHERE op_type = 'create' AND target = ?",
                libsql::params![payload, temp_id.as_str()],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn cancel_ops_for(&self, target: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute("DELETE FROM queue WHERE target = ?", libsql::params![target])
            .await?;
        Ok(())
    }

    async fn rewrite_queue_target(&self, old_id: &ItemId, new_id: &ItemId) -> Result<usize> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut rows = conn
            .query(
                "SELECT queue_id, payload FROM queue WHERE target = ? ORDER BY queue_id ASC",
                libsql::params![old_id.as_str()],
            )
            .await?;
        let mut pending = Vec::new();
        while let Some(row) = rows.next().await? {
            let queue_id: i64 = row.get(0)?;
            let payload: String = row.get(1)?;
            pending.push((queue_id, serde_json::from_str::<Operation>(&payload)?));
        }
        if pending.is_empty() {
            return Ok(0);
        }

        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = Self::rewrite_in_tx(conn, pending, new_id).await;
        Self::finish_tx(conn, result).await
    }
}
