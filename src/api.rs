use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    app_state::{AppState, Status},
    ingest::IngestionReport,
    model_select::{self, ModelChoice},
    models::UploadedPdf,
    session::{ChatMessage, CollectionCleanup, ProcessOutcome, NO_UPLOADS_WARNING},
};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct AskPayload {
    question: String,
}

#[derive(Serialize)]
pub struct AskResponse {
    answer: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    files: Vec<String>,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    report: IngestionReport,
    summary: String,
}

#[derive(Serialize)]
pub struct ResetResponse {
    message: String,
    cleanup: CollectionCleanup,
}

#[derive(Serialize)]
pub struct SessionView {
    id: String,
    started_at: String,
    messages: Vec<ChatMessage>,
    summary: String,
    pending_uploads: Vec<String>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/upload", post(upload_handler))
        .route("/api/process", post(process_handler))
        .route("/api/reset", post(reset_handler))
        .route("/api/ask", post(ask_handler))
        .route("/api/session", get(session_handler))
        .route("/api/status", get(status_handler))
        .route("/api/model", get(model_handler))
        .route("/api/shutdown", post(shutdown_handler))
        // Sin límite local de tamaño para los PDFs.
        .layer(DefaultBodyLimit::disable())
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Multipart inválido: {e}")))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if !is_pdf(&name) {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("Solo se admiten PDFs: {name}"),
            ));
        }
        let bytes = field.bytes().await.map_err(|e| {
            api_error(StatusCode::BAD_REQUEST, format!("Error leyendo {name}: {e}"))
        })?;
        files.push(UploadedPdf {
            name,
            bytes: bytes.to_vec(),
        });
    }

    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    info!("Subidos {} PDFs: {:?}", names.len(), names);
    state.session.lock().await.set_uploads(files);
    Ok(Json(UploadResponse { files: names }))
}

#[axum::debug_handler]
async fn process_handler(
    State(state): State<AppState>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut session = state.session.lock().await;
    Status::set_busy(&state.status, true, "System Indexing...".to_string());

    let result = session
        .process_uploads(
            state.store.as_ref(),
            state.provider.as_ref(),
            &state.config,
            state.status.clone(),
        )
        .await;

    match result {
        Ok(ProcessOutcome::Processed { report, summary }) => {
            Status::set_busy(&state.status, false, report.to_string());
            Ok(Json(ProcessResponse { report, summary }))
        }
        Ok(ProcessOutcome::NothingToProcess) => {
            Status::set_busy(&state.status, false, NO_UPLOADS_WARNING.to_string());
            Err(api_error(StatusCode::BAD_REQUEST, NO_UPLOADS_WARNING))
        }
        Err(err) => {
            error!("Error procesando documentos: {err:#}");
            Status::set_busy(&state.status, false, format!("Error: {err:#}"));
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error al procesar los documentos: {err:#}"),
            ))
        }
    }
}

#[axum::debug_handler]
async fn reset_handler(State(state): State<AppState>) -> Json<ResetResponse> {
    let cleanup = state.session.lock().await.reset(state.store.as_ref()).await;
    Status::set_busy(&state.status, false, "Memoria reseteada.".to_string());
    Json(ResetResponse {
        message: "Memory reset.".to_string(),
        cleanup,
    })
}

#[axum::debug_handler]
async fn ask_handler(
    State(state): State<AppState>,
    Json(payload): Json<AskPayload>,
) -> Result<Json<AskResponse>, ApiError> {
    // La pregunta viaja tal cual al prompt y al historial.
    let question = payload.question.as_str();
    if question.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "La pregunta está vacía."));
    }

    let mut session = state.session.lock().await;
    match session
        .ask(
            state.store.as_ref(),
            state.provider.as_ref(),
            &state.config,
            question,
        )
        .await
    {
        Ok(answer) => Ok(Json(AskResponse { answer })),
        Err(e) => {
            error!("Error en la consulta RAG: {e:#}");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error al procesar la consulta RAG: {e:#}"),
            ))
        }
    }
}

#[axum::debug_handler]
async fn session_handler(State(state): State<AppState>) -> Json<SessionView> {
    let session = state.session.lock().await;
    Json(SessionView {
        id: session.id.to_string(),
        started_at: session.started_at.to_rfc3339(),
        messages: session.messages.clone(),
        summary: session.summary.clone(),
        pending_uploads: session
            .pending_uploads()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(Status::snapshot(&state.status))
}

#[axum::debug_handler]
async fn model_handler(State(state): State<AppState>) -> Json<ModelChoice> {
    let choice = model_select::select_model(
        state.provider.as_ref(),
        &state.config.model_preferences,
        &state.config.fallback_model,
    )
    .await;
    Json(choice)
}

// --- Handler de Apagado y Utilidades ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    let sender = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .take();
    match sender {
        Some(sender) => {
            let _ = sender.send(());
        }
        None => warn!("El apagado ya estaba en curso."),
    }
    StatusCode::OK
}

fn is_pdf(filename: &str) -> bool {
    mime_guess::from_path(filename)
        .first()
        .is_some_and(|mime| mime.essence_str() == "application/pdf")
}
