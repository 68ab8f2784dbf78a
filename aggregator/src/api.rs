use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PublishResponse {
    /// Number of events accepted onto the ingestion queue
    pub accepted: usize,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to parse request: {0}")]
    RequestParsingError(#[from] serde_json::Error),

    #[error("request holds no event")]
    EmptyBatch,
    #[error("event submitted with an empty topic")]
    MissingTopic,

    #[error("ingestion queue is full")]
    QueueFull,
    #[error("service is shutting down")]
    ShuttingDown,
}

impl IntoResponse for PublishError {
    fn into_response(self) -> Response {
        match self {
            PublishError::RequestParsingError(_) | PublishError::MissingTopic => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }

            PublishError::EmptyBatch => (StatusCode::BAD_REQUEST, self.to_string()),

            PublishError::QueueFull | PublishError::ShuttingDown => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
        }
        .into_response()
    }
}
