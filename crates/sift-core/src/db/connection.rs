//! Database connection management

use std::path::Path;

use libsql::{Builder, Connection};

use crate::error::Result;

use super::migrations;

/// Wrapper for a local libSQL database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self { conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self { conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for durable local use
    async fn configure(&self) -> Result<()> {
        // WAL keeps readers unblocked during queue writes; not all pragmas
        // apply to in-memory databases, so failures are tolerated.
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db.connection().query("SELECT 1", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i32>(0).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_creates_file_and_reopens() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("sift.db");

        {
            let db = Database::open(&db_path).await.unwrap();
            db.connection()
                .execute(
                    "INSERT INTO items (id, status, week_of, created_at, updated_at, synced)
                     VALUES ('item-1', 'active', '2024-06-03', 1, 1, 1)",
                    (),
                )
                .await
                .unwrap();
        }

        let db = Database::open(&db_path).await.unwrap();
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM items", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i32>(0).unwrap(), 1);
    }
}
