//! Extracción de texto por página a partir de los bytes de un PDF.

use anyhow::{anyhow, Context, Result};

use crate::models::{PageText, UploadedPdf};

/// Extrae el texto de cada página en orden físico.
///
/// Devuelve también las páginas vacías (p.ej. escaneadas sin OCR): es el
/// indexador quien las descarta, para que el recuento bruto de páginas
/// siga disponible en el progreso.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<PageText>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| anyhow!("No se pudo leer el PDF: {e}"))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(index, text)| PageText { index, text })
        .collect())
}

/// Variante para el servidor, en un hilo de bloqueo. Un panic de pdf-extract
/// con un fichero corrupto se devuelve como error de ese fichero.
pub async fn extract_pages_blocking(pdf: &UploadedPdf) -> Result<Vec<PageText>> {
    let bytes = pdf.bytes.clone();
    tokio::task::spawn_blocking(move || extract_pages(&bytes))
        .await
        .map_err(|e| anyhow!("El extractor de PDF abortó: {e}"))
        .and_then(|pages| pages)
        .with_context(|| format!("Error extrayendo texto de {}", pdf.name))
}

/// Colapsa cualquier secuencia de espacios en blanco (incluidos saltos de
/// línea) en un único espacio y recorta los extremos.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
