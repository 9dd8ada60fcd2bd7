use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::Response,
    routing::{get, put},
    Json, Router,
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::api::{payload, respond, ApiPath};
use crate::services::categories::{self, CategoryChanges, NewCategory};
use crate::services::ServiceError;

pub fn admin_category_router() -> Router {
    Router::new()
        .route("/category", get(get_categories).post(create_category))
        .route(
            "/category/:id",
            get(get_category)
                .patch(patch_category)
                .delete(delete_category),
        )
        .route("/category/:id/parent", put(put_parent))
        .route("/category/:id/children", get(get_children))
}

#[derive(Debug, Deserialize)]
struct ParentPayload {
    parent_id: Option<i32>,
}

async fn get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let categories = categories::list_categories(db.as_ref(), false).await?;
    Ok(respond(StatusCode::OK, categories))
}

async fn get_category(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let category = categories::get_category(db.as_ref(), id, false).await?;
    Ok(respond(StatusCode::OK, category))
}

async fn get_children(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let children = categories::list_children(db.as_ref(), id, false).await?;
    Ok(respond(StatusCode::OK, children))
}

async fn create_category(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let input = payload(body)?;
    let txn = db.begin().await?;
    let created = categories::create_category(&txn, input).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::CREATED, created))
}

async fn patch_category(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<CategoryChanges>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let changes = payload(body)?;
    let txn = db.begin().await?;
    let updated = categories::update_category(&txn, id, changes).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::OK, updated))
}

async fn put_parent(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<ParentPayload>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let ParentPayload { parent_id } = payload(body)?;
    let txn = db.begin().await?;
    let moved = categories::reparent_category(&txn, id, parent_id).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::OK, moved))
}

async fn delete_category(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let txn = db.begin().await?;
    let orphaned = categories::delete_category(&txn, id).await?;
    txn.commit().await?;
    Ok(respond(
        StatusCode::OK,
        json!({
            "message": "Category deleted successfully.",
            "orphaned_children": orphaned,
        }),
    ))
}
