//! Estado de la sesión de chat: historial, resumen ejecutivo y PDFs pendientes.
//!
//! Cada acción del usuario es todo-o-nada sobre este estado: si falla, el
//! historial y el resumen anteriores quedan intactos.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    app_state::Status,
    config::AppConfig,
    ingest::{self, IngestionReport},
    llm::GenerativeProvider,
    models::UploadedPdf,
    rag, summary,
    vector_store::VectorStore,
};

pub const NO_UPLOADS_WARNING: &str = "Please upload at least one PDF.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            created_at: Utc::now(),
        }
    }
}

/// Qué pasó con la colección al resetear. El borrado es best-effort: un
/// fallo no impide el reset, pero queda reflejado aquí.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "collection", rename_all = "snake_case")]
pub enum CollectionCleanup {
    Deleted,
    Skipped { reason: String },
}

#[derive(Debug)]
pub enum ProcessOutcome {
    NothingToProcess,
    Processed {
        report: IngestionReport,
        summary: String,
    },
}

/// Sesión de chat. Hay una sola por proceso, compartida por todos los
/// clientes HTTP: el servidor está pensado para un único usuario local.
/// Se crea al arrancar, `reset` la vacía (conserva `id` y `started_at`) y
/// desaparece al apagar el servidor.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub summary: String,
    pending: Vec<UploadedPdf>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            messages: Vec::new(),
            summary: String::new(),
            pending: Vec::new(),
        }
    }

    /// Sustituye el conjunto de PDFs pendientes (como el control de subida).
    pub fn set_uploads(&mut self, files: Vec<UploadedPdf>) {
        self.pending = files;
    }

    pub fn pending_uploads(&self) -> Vec<&str> {
        self.pending.iter().map(|f| f.name.as_str()).collect()
    }

    /// Indexa los PDFs pendientes y regenera el resumen ejecutivo.
    ///
    /// Los ficheros indexados antes de un error se quedan en la colección;
    /// el resumen solo se reemplaza si el modelo responde.
    pub async fn process_uploads(
        &mut self,
        store: &dyn VectorStore,
        provider: &dyn GenerativeProvider,
        cfg: &AppConfig,
        status_arc: Arc<Mutex<Status>>,
    ) -> Result<ProcessOutcome> {
        if self.pending.is_empty() {
            return Ok(ProcessOutcome::NothingToProcess);
        }

        let report = ingest::index_pdfs(store, &self.pending, status_arc.clone()).await;
        info!("{}", report);

        Status::set_message(&status_arc, "Generating Executive Brief...".to_string());
        let summary =
            summary::build_executive_summary(provider, cfg, &report.text_stream).await?;
        self.summary = summary.clone();

        Ok(ProcessOutcome::Processed { report, summary })
    }

    /// Responde una pregunta y, solo si todo va bien, guarda ambos mensajes.
    pub async fn ask(
        &mut self,
        store: &dyn VectorStore,
        provider: &dyn GenerativeProvider,
        cfg: &AppConfig,
        question: &str,
    ) -> Result<String> {
        let answer = rag::answer_query(store, provider, cfg, question).await?;

        self.messages
            .push(ChatMessage::new(Role::User, question.to_string()));
        self.messages
            .push(ChatMessage::new(Role::Assistant, answer.clone()));
        Ok(answer)
    }

    /// Limpia historial, resumen y pendientes y luego intenta borrar la
    /// colección. El estado de sesión se limpia aunque el borrado falle.
    pub async fn reset(&mut self, store: &dyn VectorStore) -> CollectionCleanup {
        self.messages.clear();
        self.summary.clear();
        self.pending.clear();

        match store.delete_collection().await {
            Ok(()) => CollectionCleanup::Deleted,
            Err(err) => {
                warn!("Reset: no se pudo borrar la colección ({err:#}); se ignora");
                CollectionCleanup::Skipped {
                    reason: format!("{err:#}"),
                }
            }
        }
    }
}
