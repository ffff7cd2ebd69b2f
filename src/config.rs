//! Carga y gestión de configuración de la aplicación (vector store + Gemini).

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use url::Url;

pub const DEFAULT_MODEL_PREFERENCES: [&str; 3] =
    ["gemini-3-flash", "gemini-2.5-flash", "gemini-flash-latest"];
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-1.5-flash";

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub google_api_key: String,
    pub server_addr: String,
    pub open_browser: bool,

    pub storage_path: PathBuf,
    pub collection_name: String,

    pub gemini_api_base: Url,
    pub embedding_model: String,
    pub model_preferences: Vec<String>,
    pub fallback_model: String,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    ///
    /// La ausencia de `GOOGLE_API_KEY` es fatal: sin credencial no hay
    /// interacción posible con el proveedor.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que [`AppConfig::from_env`] pero leyendo de una función arbitraria,
    /// lo que permite probar la carga sin tocar el entorno del proceso.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let google_api_key = lookup("GOOGLE_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("GOOGLE_API_KEY is not set in your .env file."))?;

        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:3322".to_string());
        let open_browser = lookup("OPEN_BROWSER")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        let storage_path = PathBuf::from(
            lookup("RAG_STORAGE_PATH").unwrap_or_else(|| "./rag_storage".to_string()),
        );
        let collection_name =
            lookup("COLLECTION_NAME").unwrap_or_else(|| "pdf_knowledge".to_string());

        let base = lookup("GEMINI_API_BASE")
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());
        let gemini_api_base =
            Url::parse(&base).with_context(|| format!("GEMINI_API_BASE inválida: {base}"))?;

        let embedding_model =
            lookup("EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-004".to_string());

        let model_preferences = match lookup("MODEL_PREFERENCES") {
            Some(raw) => parse_list(&raw),
            None => DEFAULT_MODEL_PREFERENCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        let fallback_model =
            lookup("FALLBACK_MODEL").unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string());

        Ok(Self {
            google_api_key,
            server_addr,
            open_browser,
            storage_path,
            collection_name,
            gemini_api_base,
            embedding_model,
            model_preferences,
            fallback_model,
        })
    }

    /// Fichero SQLite donde vive la colección persistente.
    pub fn database_file(&self) -> PathBuf {
        self.storage_path.join("rag.sqlite3")
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
