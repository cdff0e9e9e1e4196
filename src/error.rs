use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::provider::ProviderError;

const UPSTREAM_FALLBACK_MESSAGE: &str = "Error en OpenAI";
const CONNECTION_MESSAGE: &str = "Error de conexión con OpenAI";

/// Every way an analysis request can fail, one variant per stage.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("No hay imagen")]
    MissingImage,
    #[error("Imagen demasiado grande")]
    PayloadTooLarge,
    #[error("Falta OPENAI_API_KEY en .env")]
    MissingApiKey,
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
    #[error("Respuesta vacía del modelo")]
    EmptyReply,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl AnalyzeError {
    pub fn upstream(status: StatusCode, message: Option<&str>) -> Self {
        AnalyzeError::Upstream {
            status,
            message: message.unwrap_or(UPSTREAM_FALLBACK_MESSAGE).to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AnalyzeError::MissingImage => StatusCode::BAD_REQUEST,
            AnalyzeError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AnalyzeError::Upstream { status, .. } => *status,
            AnalyzeError::MissingApiKey
            | AnalyzeError::EmptyReply
            | AnalyzeError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the caller. Provider failures are not detailed.
    pub fn public_message(&self) -> String {
        match self {
            AnalyzeError::Provider(_) => CONNECTION_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "Analysis failed");
        } else {
            tracing::warn!(%status, error = %self, "Analysis rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
