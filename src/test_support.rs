//! Dobles de prueba compartidos por los tests de los distintos módulos.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::llm::{GenerativeProvider, ModelInfo};
use crate::models::{DocumentChunk, QueryMatch};
use crate::vector_store::{Embedder, SqliteVectorStore, VectorStore};

const DIMS: usize = 256;

/// Bolsa de palabras con hashing: determinista y sin red.
pub struct HashingEmbedder;

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; DIMS];
                for token in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                {
                    let mut hasher = DefaultHasher::new();
                    token.to_lowercase().hash(&mut hasher);
                    v[(hasher.finish() as usize) % DIMS] += 1.0;
                }
                v
            })
            .collect())
    }
}

pub async fn open_temp_store() -> (tempfile::TempDir, SqliteVectorStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteVectorStore::open(
        &dir.path().join("rag.sqlite3"),
        "pdf_knowledge",
        Arc::new(HashingEmbedder),
    )
    .await
    .unwrap();
    (dir, store)
}

pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "GOOGLE_API_KEY" => Some("test-key".to_string()),
        "OPEN_BROWSER" => Some("false".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn model(name: &str) -> ModelInfo {
    ModelInfo {
        name: name.to_string(),
        supported_generation_methods: vec!["generateContent".to_string()],
    }
}

#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub model: String,
    pub parts: Vec<String>,
}

/// Proveedor con respuestas fijas que registra las llamadas recibidas.
pub struct ScriptedProvider {
    models: Option<Vec<ModelInfo>>,
    reply: Option<String>,
    list_calls: Mutex<usize>,
    calls: Mutex<Vec<GenerateCall>>,
}

impl ScriptedProvider {
    pub fn with_models(models: Vec<ModelInfo>) -> Self {
        Self {
            models: Some(models),
            reply: Some("scripted answer".to_string()),
            list_calls: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_listing() -> Self {
        Self {
            models: None,
            ..Self::with_models(Vec::new())
        }
    }

    pub fn replying(mut self, reply: &str) -> Self {
        self.reply = Some(reply.to_string());
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.reply = None;
        self
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    pub fn generate_calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeProvider for ScriptedProvider {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        *self.list_calls.lock().unwrap() += 1;
        self.models
            .clone()
            .ok_or_else(|| anyhow!("401 Unauthorized"))
    }

    async fn generate(&self, model: &str, parts: &[String]) -> Result<String> {
        self.calls.lock().unwrap().push(GenerateCall {
            model: model.to_string(),
            parts: parts.to_vec(),
        });
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("503 model overloaded"))
    }
}

/// Store en memoria que falla a propósito en el upsert número N o al borrar.
pub struct FlakyStore {
    fail_on_upsert: Option<usize>,
    fail_delete: bool,
    upserts: Mutex<usize>,
    ids: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn failing_on(upsert_number: usize) -> Self {
        Self {
            fail_on_upsert: Some(upsert_number),
            fail_delete: false,
            upserts: Mutex::new(0),
            ids: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_delete() -> Self {
        Self {
            fail_on_upsert: None,
            fail_delete: true,
            upserts: Mutex::new(0),
            ids: Mutex::new(Vec::new()),
        }
    }

    pub fn stored_ids(&self) -> Vec<String> {
        self.ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn upsert(&self, chunk: &DocumentChunk) -> Result<()> {
        let mut upserts = self.upserts.lock().unwrap();
        *upserts += 1;
        if Some(*upserts) == self.fail_on_upsert {
            bail!("disk I/O error");
        }
        let mut ids = self.ids.lock().unwrap();
        if !ids.contains(&chunk.id) {
            ids.push(chunk.id.clone());
        }
        Ok(())
    }

    async fn query(&self, _text: &str, _k: usize) -> Result<Vec<QueryMatch>> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.ids.lock().unwrap().len())
    }

    async fn delete_collection(&self) -> Result<()> {
        if self.fail_delete {
            bail!("collection is locked");
        }
        self.ids.lock().unwrap().clear();
        Ok(())
    }
}

/// PDF mínimo con una página por elemento de `pages` (cadena vacía = página
/// sin texto). Escribe la tabla xref con offsets reales.
pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    let font_id = 3 + 2 * page_count;
    let mut objects: Vec<String> = Vec::new();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        page_count
    ));
    for (i, text) in pages.iter().enumerate() {
        let content_id = 4 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {content_id} 0 R \
             /Resources << /Font << /F1 {font_id} 0 R >> >> >>"
        ));
        let content = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET")
        };
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}
