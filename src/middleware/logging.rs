use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed();
    match response.extensions().get::<Result<(), ApiError>>() {
        Some(Ok(())) => info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request"
        ),
        Some(Err(err)) if err.is_client_error() => warn!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            value = %err,
            "Rejected request"
        ),
        Some(Err(err)) => error!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            value = %err,
            "Failed to process request"
        ),
        // Extractor and auth rejections never reach a handler.
        None => debug!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request without a response extension"
        ),
    }

    response
}

#[derive(Clone, Debug, Error)]
pub enum ApiError {
    #[error("Failed to validate: {0}")]
    ValidationFail(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Cascade failed: {0}")]
    CascadeFailed(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Database error: {0}")]
    DbError(String),
}

impl ApiError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ApiError::ValidationFail(_) | ApiError::NotFound(_) | ApiError::Conflict(_)
        )
    }
}

pub fn to_response<T: IntoResponse>(
    response: T,               // body and status sent to the client
    ext: Result<(), ApiError>, // outcome picked up by logging_middleware
) -> Response {
    let mut response = response.into_response();

    response.extensions_mut().insert(ext);

    response
}
