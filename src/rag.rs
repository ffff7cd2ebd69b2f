//! Consulta RAG contra la colección vectorial.
//!
//! Flujo:
//!   1. Si la colección está vacía se responde con un mensaje fijo.
//!   2. Búsqueda por similitud de los `TOP_K` chunks más cercanos.
//!   3. Construcción del contexto (cabecera de fuente + texto) en el orden
//!      devuelto por el store, sin reordenar.
//!   4. El LLM responde usando solo ese contexto; su texto se devuelve tal cual.

use anyhow::Result;
use tracing::info;

use crate::{
    config::AppConfig, llm::GenerativeProvider, model_select, models::QueryMatch,
    vector_store::VectorStore,
};

pub const TOP_K: usize = 4;

pub const NO_DOCUMENTS_MESSAGE: &str =
    "I don't have any indexed documents yet. Please upload and process PDFs first.";

pub const SYSTEM_PROMPT: &str = "You are a helpful RAG assistant. \
Use ONLY the context below to answer the question. \
If the answer is not in the context, say you don't know.\n";

/// Une los resultados como bloques `Source: {fichero} (page {n})\n{texto}`
/// separados por una línea en blanco.
pub fn build_context(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .map(|m| {
            format!(
                "Source: {} (page {})\n{}",
                m.metadata.source, m.metadata.page, m.document
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_question_part(context: &str, question: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {question}")
}

/// Lanza una consulta RAG y devuelve la respuesta del modelo.
pub async fn answer_query(
    store: &dyn VectorStore,
    provider: &dyn GenerativeProvider,
    cfg: &AppConfig,
    question: &str,
) -> Result<String> {
    if store.count().await? == 0 {
        return Ok(NO_DOCUMENTS_MESSAGE.to_string());
    }

    let matches = store.query(question, TOP_K).await?;
    info!(
        "Pregunta '{}': {} chunks recuperados ({})",
        question,
        matches.len(),
        matches
            .iter()
            .map(|m| m.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let context = build_context(&matches);

    let choice =
        model_select::select_model(provider, &cfg.model_preferences, &cfg.fallback_model).await;

    provider
        .generate(
            choice.name(),
            &[SYSTEM_PROMPT.to_string(), build_question_part(&context, question)],
        )
        .await
}
