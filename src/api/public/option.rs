use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::api::{respond, ApiPath};
use crate::services::{options, ServiceError};

pub fn option_router() -> Router {
    Router::new()
        .route("/option-group", get(get_groups))
        .route("/option-group/:id", get(get_group))
}

async fn get_groups(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let groups = options::list_groups(db.as_ref(), true).await?;
    Ok(respond(StatusCode::OK, groups))
}

async fn get_group(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let group = options::get_group(db.as_ref(), id, true).await?;
    Ok(respond(StatusCode::OK, group))
}
