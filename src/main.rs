use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

mod error;
use error::AnalyzeError;
mod model;
use model::Upload;
mod provider;
use provider::{InferenceProvider, OpenAiClient};
mod utils;
use utils::{get_env, Settings};

#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
    provider: Arc<dyn InferenceProvider>,
}

const IMAGE_FIELD: &str = "image";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let settings = get_env()?;
    if settings.api_key().is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; analysis requests will be refused");
    }

    let port = settings.port;
    let body_limit_bytes = settings.body_limit_bytes;
    let provider = OpenAiClient::new(settings.provider_url.clone());
    let shared_state = AppState {
        settings: Arc::new(settings),
        provider: Arc::new(provider),
    };

    let app = app(shared_state, body_limit_bytes);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
        .route("/health", get(health_check))
}

#[instrument(skip_all)]
async fn analyze_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AnalyzeError> {
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!("Rejected non-multipart body: {}", rejection);
        AnalyzeError::MissingImage
    })?;
    let upload = read_upload(multipart).await?;

    let api_key = state
        .settings
        .api_key()
        .ok_or(AnalyzeError::MissingApiKey)?;

    tracing::info!(
        mime_type = %upload.mime_type,
        bytes = upload.bytes.len(),
        "Analyzing uploaded image"
    );

    let outcome = state.provider.analyze(api_key, &upload).await?;
    if !outcome.status.is_success() {
        return Err(AnalyzeError::upstream(
            outcome.status,
            outcome.reply.error_message(),
        ));
    }

    let text = outcome
        .reply
        .output_text()
        .ok_or(AnalyzeError::EmptyReply)?
        .to_string();

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        text,
    )
        .into_response())
}

/// Takes the first `image` field, which must be a file part.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AnalyzeError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        if field.file_name().is_none() {
            return Err(AnalyzeError::MissingImage);
        }

        let declared_mime_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(upload_error)?;
        return Ok(Upload::new(bytes, declared_mime_type.as_deref()));
    }

    Err(AnalyzeError::MissingImage)
}

fn upload_error(err: MultipartError) -> AnalyzeError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AnalyzeError::PayloadTooLarge
    } else {
        tracing::debug!("Malformed multipart body: {}", err);
        AnalyzeError::MissingImage
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}
