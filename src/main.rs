// Módulos de la aplicación
mod api;
mod app_state;
mod config;
mod extract;
mod ingest;
mod llm;
mod model_select;
mod models;
mod rag;
mod session;
mod summary;
mod vector_store;

#[cfg(test)]
mod test_support;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::llm::{GeminiClient, GeminiEmbedder};
use crate::vector_store::SqliteVectorStore;

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // 2. Cargar configuración (sin GOOGLE_API_KEY no se arranca)
    let cfg = config::AppConfig::from_env()?;

    // 3. Cliente de Gemini y colección vectorial persistente
    let gemini = GeminiClient::from_config(&cfg);
    let embedder = GeminiEmbedder::new(gemini.clone(), cfg.embedding_model.clone());
    let store = SqliteVectorStore::open(
        &cfg.database_file(),
        &cfg.collection_name,
        Arc::new(embedder),
    )
    .await
    .context("Error abriendo el vector store")?;

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState::new(
        cfg.clone(),
        Arc::new(store),
        Arc::new(gemini),
        Some(shutdown_tx),
    );

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {}", cfg.server_addr))?;
    let server_url = format!("http://{}", cfg.server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    if cfg.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .context("Error en el servidor HTTP")?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
