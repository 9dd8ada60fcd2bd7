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
use crate::services::{categories, ServiceError};

pub fn category_router() -> Router {
    Router::new()
        .route("/category", get(get_categories))
        .route("/category/tree", get(get_tree))
        .route("/category/:id", get(get_category))
        .route("/category/:id/children", get(get_children))
}

async fn get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let categories = categories::list_categories(db.as_ref(), true).await?;
    Ok(respond(StatusCode::OK, categories))
}

async fn get_tree(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let tree = categories::category_tree(db.as_ref()).await?;
    Ok(respond(StatusCode::OK, tree))
}

async fn get_category(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let category = categories::get_category(db.as_ref(), id, true).await?;
    Ok(respond(StatusCode::OK, category))
}

async fn get_children(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let children = categories::list_children(db.as_ref(), id, true).await?;
    Ok(respond(StatusCode::OK, children))
}
