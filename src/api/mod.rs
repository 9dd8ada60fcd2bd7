pub mod admin;
pub mod public;

use axum::{
    async_trait,
    extract::{
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Path, Query,
    },
    http::{request::Parts, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Response},
    Extension, Json, Router,
};
use sea_orm::DatabaseConnection;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::middleware::logging::{logging_middleware, to_response, ApiError};
use crate::services::{ServiceError, ServiceResult};
use crate::storage::ImageStore;

use admin::admin_api_router;
use public::public_api_router;

pub fn create_api_router(
    db: Arc<DatabaseConnection>,
    store: Arc<ImageStore>,
    secret: Arc<String>,
) -> Router {
    let max_upload = store.max_bytes();

    Router::new()
        .nest("/api", public_api_router())
        .nest("/api/admin", admin_api_router(secret, max_upload))
        .layer(Extension(db))
        .layer(Extension(store))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

/// JSON success response, tagged for the logging middleware.
pub(crate) fn respond<T: Serialize>(status: StatusCode, body: T) -> Response {
    to_response((status, Json(body)), Ok(()))
}

/// Unwraps a JSON body, reporting malformed payloads as validation errors.
pub(crate) fn payload<T>(body: Result<Json<T>, JsonRejection>) -> ServiceResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ServiceError::Validation {
            fields: Vec::new(),
            message: rejection.body_text(),
        })
}

/// `Path` whose rejection is a [`ServiceError`], naming the parameter that failed to parse.
pub(crate) struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(path_error(rejection)),
        }
    }
}

/// `Query` whose rejection is a [`ServiceError`].
pub(crate) struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(query_error(rejection)),
        }
    }
}

fn path_error(rejection: PathRejection) -> ServiceError {
    let fields = match &rejection {
        PathRejection::FailedToDeserializePathParams(err) => match err.kind() {
            ErrorKind::ParseErrorAtKey { key, .. } => vec![key.clone()],
            // Single parameter routes all name it `:id`.
            ErrorKind::ParseError { .. } => vec!["id".to_string()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    ServiceError::Validation {
        fields,
        message: rejection.body_text(),
    }
}

fn query_error(rejection: QueryRejection) -> ServiceError {
    ServiceError::Validation {
        fields: Vec::new(),
        message: rejection.body_text(),
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, logged) = match &self {
            ServiceError::Validation { .. } => {
                (StatusCode::BAD_REQUEST, ApiError::ValidationFail(self.to_string()))
            }
            ServiceError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, ApiError::NotFound(self.to_string()))
            }
            ServiceError::Conflict { .. } => {
                (StatusCode::CONFLICT, ApiError::Conflict(self.to_string()))
            }
            ServiceError::IntegrityCascadeFailure(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::CascadeFailed(msg.clone()),
            ),
            ServiceError::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::Storage(msg.clone()),
            ),
            ServiceError::Db(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::DbError(err.to_string()),
            ),
        };

        // Storage and database details stay in the logs.
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        to_response(
            (
                status,
                Json(json!({
                    "error": message,
                    "kind": self.kind(),
                    "fields": self.fields(),
                })),
            ),
            Err(logged),
        )
    }
}
