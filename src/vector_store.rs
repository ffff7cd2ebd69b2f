//! Colección vectorial persistente sobre SQLite.
//!
//! API pública:
//!   - `VectorStore` (upsert / query / count / delete_collection)
//!   - `SqliteVectorStore::open(path, collection, embedder)` (= get_or_create).
//!
//! Los embeddings se calculan con un `Embedder` inyectado y se guardan como
//! BLOB (f32 little-endian). La similitud es coseno calculada en proceso.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use crate::models::{ChunkMetadata, DocumentChunk, QueryMatch};

/// Calcula embeddings para una lista de textos.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Operaciones que el pipeline RAG necesita de la colección.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserta o sobrescribe (por id) texto, metadatos y embedding.
    async fn upsert(&self, chunk: &DocumentChunk) -> Result<()>;

    /// Los `k` registros más similares a `text`, de mayor a menor similitud.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<QueryMatch>>;

    async fn count(&self) -> Result<usize>;

    /// Borra la colección completa. Falla si no existe.
    async fn delete_collection(&self) -> Result<()>;
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    /// Abre (creándolo si hace falta) el fichero SQLite y asegura que la
    /// colección exista.
    pub async fn open(
        db_path: &Path,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("No se pudo crear el directorio {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Error abriendo {}", db_path.display()))?;

        let store = Self {
            pool,
            collection: collection.to_string(),
            embedder,
        };
        store.ensure_schema().await?;
        store.get_or_create().await?;
        info!(
            "Colección '{}' lista en {} ({} registros).",
            collection,
            db_path.display(),
            store.count().await?
        );
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                source TEXT NOT NULL,
                page INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                UNIQUE(collection, id)
            )",
        ];
        for stmt in statements {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn get_or_create(&self) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(&self.collection)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("El embedder no devolvió ningún vector"))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, chunk: &DocumentChunk) -> Result<()> {
        self.get_or_create().await?;
        let blob = vec_to_blob(&self.embed_one(&chunk.text).await?);

        sqlx::query(
            r#"
            INSERT INTO records (collection, id, document, source, page, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                document = excluded.document,
                source = excluded.source,
                page = excluded.page,
                embedding = excluded.embedding
            "#,
        )
        .bind(&self.collection)
        .bind(&chunk.id)
        .bind(&chunk.text)
        .bind(&chunk.metadata.source)
        .bind(chunk.metadata.page)
        .bind(&blob)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Error en upsert de '{}'", chunk.id))?;

        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<QueryMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_one(text).await?;

        let rows = sqlx::query(
            "SELECT id, document, source, page, embedding FROM records
             WHERE collection = ? ORDER BY seq",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            matches.push(QueryMatch {
                id: row.try_get("id")?,
                document: row.try_get("document")?,
                metadata: ChunkMetadata {
                    source: row.try_get("source")?,
                    page: row.try_get("page")?,
                },
                score: cosine_similarity(&query_vec, &blob_to_vec(&blob)),
            });
        }

        // sort_by es estable: a igual similitud gana el orden de inserción.
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        Ok(matches)
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM records WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as usize)
    }

    async fn delete_collection(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            bail!("La colección '{}' no existe", self.collection);
        }

        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Colección '{}' eliminada.", self.collection);
        Ok(())
    }
}

pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Similitud coseno; 0.0 si las dimensiones no cuadran o algún vector es nulo.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
