use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::{path::Path, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Failed to prepare database location: {0}")]
    Location(#[from] std::io::Error),
    #[error("Storage worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// An immutable persisted image, either an upload or a detection result.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub id: i64,
    pub name: String,
    pub data: Bytes,
}

#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Inserts a new record and returns its id. Ids are never reused.
    async fn put(&self, name: &str, data: Bytes) -> Result<i64, StorageError>;

    async fn get(&self, id: i64) -> Result<Option<StoredImage>, StorageError>;
}

/// SQLite-backed store. Each insert is a single autocommitted statement.
#[derive(Clone)]
pub struct SqliteBlobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBlobStore {
    /// Opens `database_url`, which is a file path, a `sqlite://` URL or `:memory:`.
    pub fn open(database_url: &str) -> Result<Self, StorageError> {
        let path = database_url
            .strip_prefix("sqlite://")
            .unwrap_or(database_url);

        if path == ":memory:" {
            return Self::open_in_memory();
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        tracing::info!("Image database opened at {}", path);
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS file (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                filename    TEXT NOT NULL,
                data        BLOB NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<i64, StorageError> {
        let conn = self.conn.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || -> Result<i64, StorageError> {
            let conn = conn.lock();
            conn.execute(
                "INSERT INTO file (filename, data) VALUES (?1, ?2)",
                params![name, &data[..]],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await?
    }

    async fn get(&self, id: i64) -> Result<Option<StoredImage>, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<StoredImage>, StorageError> {
            let conn = conn.lock();
            let image = conn
                .query_row(
                    "SELECT id, filename, data FROM file WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(StoredImage {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            data: Bytes::from(row.get::<_, Vec<u8>>(2)?),
                        })
                    },
                )
                .optional()?;
            Ok(image)
        })
        .await?
    }
}
