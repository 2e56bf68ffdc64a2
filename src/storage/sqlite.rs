//! SQLite storage implementation.
//!
//! This module provides a SQLite-based implementation of the `PassageStorage`
//! trait. It uses rusqlite for database access, stores embeddings as
//! little-endian f32 BLOBs and metadata as JSON text.

use super::{PassageStorage, StorageError, StorageResult};
use crate::models::{EmbeddingConfig, Passage, PassageMetadata};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::debug;

/// File name of the database inside the persist directory.
pub const DATABASE_FILE_NAME: &str = "axlerate.sqlite3";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        model_name TEXT NOT NULL,
        dimension INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS passages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT NOT NULL,
        text TEXT NOT NULL,
        metadata TEXT NOT NULL,
        embedding BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_passages_collection ON passages(collection);
";

/// SQLite-based passage storage bound to one collection.
///
/// # Schema
/// - `collections`: embedding configuration per collection name
/// - `passages`: passage text, JSON metadata and embedding BLOB
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,

    /// Path to the SQLite database file (None for in-memory databases)
    db_path: Option<PathBuf>,

    collection: String,
}

impl SqliteStorage {
    /// Open (or create) the database inside `persist_dir`.
    ///
    /// The directory is created if missing. Schema creation happens in
    /// [`PassageStorage::initialize`].
    pub fn open(persist_dir: impl AsRef<Path>, collection: impl Into<String>) -> StorageResult<Self> {
        let persist_dir = persist_dir.as_ref();
        std::fs::create_dir_all(persist_dir).map_err(|e| {
            StorageError::ConnectionError(format!(
                "Failed to create persist directory {}: {}",
                persist_dir.display(),
                e
            ))
        })?;

        let db_path = persist_dir.join(DATABASE_FILE_NAME);
        let conn = Connection::open(&db_path).map_err(|e| {
            StorageError::ConnectionError(format!("Failed to open {}: {}", db_path.display(), e))
        })?;
        debug!("Opened SQLite store at {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Some(db_path),
            collection: collection.into(),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(collection: impl Into<String>) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: None,
            collection: collection.into(),
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run `op` against the connection on tokio's blocking pool.
    async fn blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let collection = self.collection.clone();

        task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StorageError::ConnectionError("connection lock poisoned".to_string()))?;
            op(&conn, &collection)
        })
        .await
        .map_err(|e| StorageError::ConnectionError(format!("Storage task failed: {}", e)))?
    }

    /// Serialize an embedding vector to bytes for BLOB storage.
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Deserialize an embedding vector from BLOB bytes.
    fn deserialize_embedding(bytes: &[u8]) -> StorageResult<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return Err(StorageError::SerializationError(format!(
                "Embedding BLOB length {} is not a multiple of 4",
                bytes.len()
            )));
        }

        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    fn passage_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, Vec<u8>)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn decode_passage(raw: (i64, String, String, Vec<u8>)) -> StorageResult<Passage> {
        let (id, text, metadata, embedding) = raw;
        let metadata: PassageMetadata = serde_json::from_str(&metadata)
            .map_err(|e| StorageError::SerializationError(format!("Invalid metadata for passage {}: {}", id, e)))?;

        Ok(Passage {
            id: Some(id),
            text,
            metadata,
            embedding: Some(Self::deserialize_embedding(&embedding)?),
        })
    }
}

#[async_trait]
impl PassageStorage for SqliteStorage {
    async fn initialize(&mut self) -> StorageResult<()> {
        self.blocking(|conn, _| {
            conn.execute_batch(SCHEMA)
                .map_err(|e| StorageError::SchemaError(e.to_string()))
        })
        .await
    }

    async fn store_config(&mut self, config: &EmbeddingConfig) -> StorageResult<()> {
        let config = config.clone();
        self.blocking(move |conn, collection| {
            conn.execute(
                "INSERT INTO collections (name, model_name, dimension) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET model_name = excluded.model_name, dimension = excluded.dimension",
                params![collection, config.model_name, config.dimension as i64],
            )
            .map_err(|e| StorageError::QueryError(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn get_config(&self) -> StorageResult<Option<EmbeddingConfig>> {
        self.blocking(|conn, collection| {
            let row: Option<(String, i64)> = conn
                .query_row(
                    "SELECT model_name, dimension FROM collections WHERE name = ?1",
                    params![collection],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|e| StorageError::QueryError(e.to_string()))?;

            Ok(row.map(|(model_name, dimension)| EmbeddingConfig {
                model_name,
                dimension: dimension as usize,
            }))
        })
        .await
    }

    async fn insert_passage(&mut self, passage: &Passage) -> StorageResult<i64> {
        let embedding = passage.embedding.as_ref().ok_or_else(|| {
            StorageError::SerializationError("Passage must carry an embedding before insertion".to_string())
        })?;
        let metadata = serde_json::to_string(&passage.metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let blob = Self::serialize_embedding(embedding);
        let text = passage.text.clone();

        self.blocking(move |conn, collection| {
            conn.execute(
                "INSERT INTO passages (collection, text, metadata, embedding) VALUES (?1, ?2, ?3, ?4)",
                params![collection, text, metadata, blob],
            )
            .map_err(|e| StorageError::QueryError(e.to_string()))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get_all_passages(&self) -> StorageResult<Vec<Passage>> {
        self.blocking(|conn, collection| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, text, metadata, embedding FROM passages WHERE collection = ?1 ORDER BY id",
                )
                .map_err(|e| StorageError::QueryError(e.to_string()))?;

            let rows = stmt
                .query_map(params![collection], Self::passage_from_row)
                .map_err(|e| StorageError::QueryError(e.to_string()))?;

            let mut passages = Vec::new();
            for row in rows {
                let raw = row.map_err(|e| StorageError::QueryError(e.to_string()))?;
                passages.push(Self::decode_passage(raw)?);
            }
            Ok(passages)
        })
        .await
    }

    async fn count_passages(&self) -> StorageResult<usize> {
        self.blocking(|conn, collection| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM passages WHERE collection = ?1",
                    params![collection],
                    |row| row.get(0),
                )
                .map_err(|e| StorageError::QueryError(e.to_string()))?;
            Ok(count as usize)
        })
        .await
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
