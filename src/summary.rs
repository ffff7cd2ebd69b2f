//! Resumen ejecutivo a partir de tres muestras del texto indexado
//! (inicio, mitad y final), sin pasar por el vector store.

use anyhow::Result;
use tracing::info;

use crate::{config::AppConfig, llm::GenerativeProvider, model_select};

pub const SUMMARY_PROMPT: &str = "Summarize this document thoroughly in 4 detailed bullet points. \
Focus on the most important ideas, results, or arguments.";

pub const NO_TEXT_MESSAGE: &str = "No readable text found in the uploaded PDFs.";

pub const SEGMENT_SIZE: usize = 5000;
pub const SEGMENT_SEPARATOR: &str = "\n---SEGMENT---\n";

/// Devuelve las tres muestras de `seg_size` caracteres: los primeros, los que
/// empiezan en la mitad del texto y los últimos.
///
/// Con textos cortos las muestras se solapan o se repiten; se acepta así.
pub fn sample_segments(text: &str, seg_size: usize) -> [String; 3] {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let slice = |from: usize, to: usize| -> String {
        chars[from.min(len)..to.min(len)].iter().collect()
    };

    let mid = len / 2;
    [
        slice(0, seg_size),
        slice(mid, mid + seg_size),
        slice(len.saturating_sub(seg_size), len),
    ]
}

pub fn combine_samples(text: &str, seg_size: usize) -> String {
    sample_segments(text, seg_size).join(SEGMENT_SEPARATOR)
}

/// Pide al modelo un resumen de 4 viñetas y devuelve su texto tal cual.
///
/// Si el texto está vacío devuelve [`NO_TEXT_MESSAGE`] sin llamar al modelo.
pub async fn build_executive_summary(
    provider: &dyn GenerativeProvider,
    cfg: &AppConfig,
    full_text_stream: &str,
) -> Result<String> {
    if full_text_stream.trim().is_empty() {
        return Ok(NO_TEXT_MESSAGE.to_string());
    }

    let combined_context = combine_samples(full_text_stream, SEGMENT_SIZE);

    let choice =
        model_select::select_model(provider, &cfg.model_preferences, &cfg.fallback_model).await;
    info!("Generando resumen ejecutivo con {:?}", choice);

    provider
        .generate(
            choice.name(),
            &[SUMMARY_PROMPT.to_string(), combined_context],
        )
        .await
}
