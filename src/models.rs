//! Modelos de dominio (páginas extraídas, chunks indexados y resultados).

use serde::{Deserialize, Serialize};

/// Texto de una página física del PDF, tal y como sale del extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// Índice 0-based de la página dentro del fichero.
    pub index: usize,
    pub text: String,
}

/// Metadatos guardados junto a cada chunk en la colección.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    /// Número de página 1-based (el id usa el índice 0-based).
    pub page: i64,
}

/// Una página limpia lista para el upsert en la colección.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Construye el chunk de la página `page_index` (0-based) de `filename`.
    ///
    /// El id conserva el índice 0-based (`{filename}_{page_index}`) y los
    /// metadatos el número de página 1-based; ambos esquemas se mantienen tal cual.
    pub fn from_page(filename: &str, page_index: usize, text: String) -> Self {
        Self {
            id: chunk_id(filename, page_index),
            text,
            metadata: ChunkMetadata {
                source: filename.to_string(),
                page: page_index as i64 + 1,
            },
        }
    }
}

pub fn chunk_id(filename: &str, page_index: usize) -> String {
    format!("{filename}_{page_index}")
}

/// Un resultado de la búsqueda por similitud, en el orden devuelto por el store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// Un PDF subido por el usuario y pendiente de procesar.
#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub name: String,
    pub bytes: Vec<u8>,
}
