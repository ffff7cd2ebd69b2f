//! Indexación de los PDFs subidos: una página limpia = un chunk, con upsert
//! por id `{fichero}_{página}` en la colección vectorial.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    app_state::Status,
    extract::{self, normalize_whitespace},
    models::{DocumentChunk, UploadedPdf},
    vector_store::VectorStore,
};

/// Resultado de un fichero dentro del lote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileOutcome {
    Indexed { pages: usize, chunks: usize },
    /// Lectura o upsert fallidos. Las páginas ya indexadas de este fichero
    /// se quedan en la colección.
    Failed { chunks: usize, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub name: String,
    pub outcome: FileOutcome,
}

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Default, Serialize)]
pub struct IngestionReport {
    pub files: Vec<FileReport>,
    /// Páginas leídas, incluidas las vacías.
    pub total_pages: usize,
    pub chunks_indexed: usize,
    /// Texto limpio de las páginas indexadas con éxito, en orden, una por línea.
    #[serde(skip)]
    pub text_stream: String,
}

impl IngestionReport {
    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed { .. }))
            .count()
    }
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for IngestionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Indexing complete ({} pages). {} chunks indexed from {} files, {} failed.",
            self.total_pages,
            self.chunks_indexed,
            self.files.len(),
            self.failed_files()
        )
    }
}

/// Procesa los ficheros en orden, secuencialmente.
///
/// Un fichero ilegible o un upsert fallido aborta solo ese fichero; el lote
/// continúa con el siguiente.
pub async fn index_pdfs(
    store: &dyn VectorStore,
    files: &[UploadedPdf],
    status_arc: Arc<Mutex<Status>>,
) -> IngestionReport {
    let mut report = IngestionReport::default();
    let total_files = files.len().max(1) as f32;

    for (index, pdf) in files.iter().enumerate() {
        Status::update(&status_arc, format!("Current File: {}", pdf.name), index as f32 / total_files);
        info!("Procesando {} ({} bytes)", pdf.name, pdf.bytes.len());

        let mut chunks = 0;
        let outcome = match index_file(store, pdf, &mut report, &mut chunks, &status_arc).await {
            Ok(pages) => {
                info!("Indexado {}: {} páginas, {} chunks", pdf.name, pages, chunks);
                FileOutcome::Indexed { pages, chunks }
            }
            Err(err) => {
                error!("Error indexando {}: {err:#}", pdf.name);
                FileOutcome::Failed {
                    chunks,
                    reason: format!("{err:#}"),
                }
            }
        };
        report.files.push(FileReport {
            name: pdf.name.clone(),
            outcome,
        });
    }

    Status::update(
        &status_arc,
        format!(
            "Indexing complete ({} pages). Generating summary...",
            report.total_pages
        ),
        1.0,
    );
    report
}

/// Indexa un fichero y devuelve su número bruto de páginas.
async fn index_file(
    store: &dyn VectorStore,
    pdf: &UploadedPdf,
    report: &mut IngestionReport,
    chunks: &mut usize,
    status_arc: &Arc<Mutex<Status>>,
) -> Result<usize> {
    let pages = extract::extract_pages_blocking(pdf).await?;
    let page_count = pages.len();

    for page in pages {
        report.total_pages += 1;

        let clean_text = normalize_whitespace(&page.text);
        if clean_text.is_empty() {
            warn!("{}: página {} sin texto extraíble", pdf.name, page.index + 1);
            continue;
        }

        let chunk = DocumentChunk::from_page(&pdf.name, page.index, clean_text);
        store.upsert(&chunk).await?;

        // Solo entra en el resumen lo que ha quedado indexado.
        report.text_stream.push_str(&chunk.text);
        report.text_stream.push('\n');
        *chunks += 1;
        report.chunks_indexed += 1;

        if page.index % 10 == 0 {
            Status::set_message(
                status_arc,
                format!("{}: Pg {} indexed", pdf.name, page.index + 1),
            );
        }
    }

    Ok(page_count)
}
