use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::{
    config::AppConfig, llm::GenerativeProvider, session::Session, vector_store::VectorStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn VectorStore>,
    pub provider: Arc<dyn GenerativeProvider>,
    /// Un único usuario: el mutex asíncrono serializa las acciones (subir,
    /// procesar, preguntar, resetear) y se mantiene durante toda la acción.
    pub session: Arc<tokio::sync::Mutex<Session>>,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn GenerativeProvider>,
        shutdown_tx: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            config,
            store,
            provider,
            session: Arc::new(tokio::sync::Mutex::new(Session::new())),
            status: Arc::new(Mutex::new(Status {
                is_busy: false,
                message: "Servidor listo.".to_string(),
                progress: 0.0,
            })),
            shutdown_sender: Arc::new(Mutex::new(shutdown_tx)),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}

impl Status {
    pub fn update(status: &Mutex<Status>, message: String, progress: f32) {
        let mut status = status.lock().unwrap_or_else(|p| p.into_inner());
        status.message = message;
        status.progress = progress;
    }

    pub fn set_message(status: &Mutex<Status>, message: String) {
        status.lock().unwrap_or_else(|p| p.into_inner()).message = message;
    }

    pub fn set_busy(status: &Mutex<Status>, busy: bool, message: String) {
        let mut status = status.lock().unwrap_or_else(|p| p.into_inner());
        status.is_busy = busy;
        status.message = message;
        status.progress = 0.0;
    }

    pub fn snapshot(status: &Mutex<Status>) -> Status {
        status.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
