//! Database migrations

use libsql::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Run a migration's statements inside a transaction.
async fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: item records
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Items table
            "CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                url TEXT,
                title TEXT,
                notes TEXT,
                category TEXT,
                status TEXT NOT NULL,
                week_of TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_items_status ON items(status)",
            "CREATE INDEX IF NOT EXISTS idx_items_week ON items(week_of)",
            "CREATE INDEX IF NOT EXISTS idx_items_created ON items(created_at DESC)",
            // Record migration version
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )
    .await?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: durable operation queue
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS queue (
                queue_id INTEGER PRIMARY KEY AUTOINCREMENT,
                op_type TEXT NOT NULL,
                target TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_queue_target ON queue(target)",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )
    .await?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migration_v2_creates_queue_table() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = 'queue'
                )",
                (),
            )
            .await
            .unwrap();

        let exists = rows
            .next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0);

        assert!(exists);
    }
}
