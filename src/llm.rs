//! Abstracción sobre Gemini: listado de modelos, generación y embeddings.
//!
//! La generación y los embeddings pasan por Rig; el listado de modelos no
//! está en Rig, así que se consulta el endpoint REST con reqwest.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::AppConfig;
use crate::vector_store::Embedder;

const GENERATE_CONTENT: &str = "generateContent";

/// Un modelo anunciado por el proveedor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Nombre sin el prefijo `models/`.
    pub name: String,
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == GENERATE_CONTENT)
    }
}

/// Proveedor de modelos generativos.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Envía las partes del prompt, en orden, al modelo `model` y devuelve el
    /// texto de la respuesta sin tocar.
    async fn generate(&self, model: &str, parts: &[String]) -> Result<String>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsPage {
    #[serde(default)]
    models: Vec<RawModel>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModel {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl From<RawModel> for ModelInfo {
    fn from(raw: RawModel) -> Self {
        let name = raw
            .name
            .strip_prefix("models/")
            .unwrap_or(&raw.name)
            .to_string();
        Self {
            name,
            supported_generation_methods: raw.supported_generation_methods,
        }
    }
}

/// Cliente de Gemini (Google Generative Language API).
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    api_base: Url,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            api_key: cfg.google_api_key.clone(),
            api_base: cfg.gemini_api_base.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Base sin la barra final: Rig concatena `{base}/{ruta}`.
    fn rig_base_url(&self) -> String {
        self.api_base.as_str().trim_end_matches('/').to_string()
    }

    /// Cliente de Rig apuntando a la misma base que el listado de modelos.
    fn rig_client(&self) -> Result<rig::providers::gemini::Client> {
        let base_url = self.rig_base_url();
        let client = rig::providers::gemini::Client::builder(&self.api_key)
            .base_url(&base_url)
            .build()
            .context("No se pudo construir el cliente de Gemini")?;
        Ok(client)
    }

    async fn fetch_models_page(&self, page_token: Option<&str>) -> Result<ListModelsPage> {
        let mut url = self.api_base.join("v1beta/models")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("key", &self.api_key);
            query.append_pair("pageSize", "1000");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let page = self
            .http
            .get(url)
            .send()
            .await
            .context("Error de red listando modelos de Gemini")?
            .error_for_status()
            .context("Gemini rechazó el listado de modelos")?
            .json::<ListModelsPage>()
            .await
            .context("Respuesta inesperada al listar modelos")?;
        Ok(page)
    }
}

#[async_trait]
impl GenerativeProvider for GeminiClient {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let mut models = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.fetch_models_page(token.as_deref()).await?;
            models.extend(
                page.models
                    .into_iter()
                    .map(ModelInfo::from)
                    .filter(ModelInfo::supports_generation),
            );
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!("Gemini anuncia {} modelos con generateContent", models.len());
        Ok(models)
    }

    async fn generate(&self, model: &str, parts: &[String]) -> Result<String> {
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        let (preamble, rest) = parts
            .split_first()
            .ok_or_else(|| anyhow!("Prompt vacío: no hay nada que enviar al modelo"))?;

        let agent = self
            .rig_client()?
            .agent(model)
            .preamble(preamble)
            .build();

        let answer = agent
            .prompt(rest.join("\n"))
            .await
            .with_context(|| format!("Error generando contenido con {model}"))?;
        Ok(answer)
    }
}

/// Embeddings con el modelo de Gemini configurado.
#[derive(Clone)]
pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Trait para client.embedding_model(...)
        use rig::client::EmbeddingsClient as _;

        let embedding_model = self.client.rig_client()?.embedding_model(&self.model);
        let embeddings = embedding_model
            .embed_texts(texts.to_vec())
            .await
            .with_context(|| format!("Error calculando embeddings con {}", self.model))?;

        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Número de embeddings ({}) distinto al número de textos ({})",
                embeddings.len(),
                texts.len()
            ));
        }

        Ok(embeddings
            .into_iter()
            .map(|e| e.vec.into_iter().map(|v| v as f32).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_page_parses_and_strips_prefix() {
        let body = r#"{
            "models": [
                {"name": "models/gemini-2.5-flash", "supportedGenerationMethods": ["generateContent", "countTokens"]},
                {"name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"]},
                {"name": "models/aqa"}
            ],
            "nextPageToken": "abc"
        }"#;
        let page: ListModelsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        let models: Vec<ModelInfo> = page.models.into_iter().map(ModelInfo::from).collect();
        assert_eq!(models[0].name, "gemini-2.5-flash");
        assert!(models[0].supports_generation());
        assert!(!models[1].supports_generation());
        assert!(!models[2].supports_generation());
    }

    #[test]
    fn configured_base_reaches_the_rig_client() {
        let mut cfg = crate::test_support::test_config();
        cfg.gemini_api_base = Url::parse("http://127.0.0.1:9999/").unwrap();
        let client = GeminiClient::from_config(&cfg);

        assert_eq!(client.rig_base_url(), "http://127.0.0.1:9999");
        let debug = format!("{:?}", client.rig_client().unwrap());
        assert!(debug.contains("base_url: \"http://127.0.0.1:9999\""));
        assert!(!debug.contains("googleapis"));
    }

    #[test]
    fn empty_listing_parses() {
        let page: ListModelsPage = serde_json::from_str("{}").unwrap();
        assert!(page.models.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
