use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde_json::json;
use std::sync::Arc;

use crate::api::{payload, respond, ApiPath};
use crate::services::options::{
    self, NewOptionAttribute, NewOptionGroup, NewOptionValue, OptionGroupChanges,
};
use crate::services::ServiceError;

pub fn admin_option_router() -> Router {
    Router::new()
        .route("/option-group", get(get_groups).post(create_group))
        .route(
            "/option-group/:id",
            get(get_group).patch(patch_group).delete(delete_group),
        )
        .route("/option-group/:id/deactivate", post(deactivate_group))
        .route("/option-group/:id/value", post(add_value))
        .route("/option-group/:id/attribute", post(add_attribute))
        .route("/option-value/:id/deactivate", post(deactivate_value))
}

async fn get_groups(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let groups = options::list_groups(db.as_ref(), false).await?;
    Ok(respond(StatusCode::OK, groups))
}

async fn get_group(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let group = options::get_group(db.as_ref(), id, false).await?;
    Ok(respond(StatusCode::OK, group))
}

async fn create_group(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<NewOptionGroup>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let input = payload(body)?;
    let txn = db.begin().await?;
    let created = options::create_group(&txn, input).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::CREATED, created))
}

async fn patch_group(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<OptionGroupChanges>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let changes = payload(body)?;
    let txn = db.begin().await?;
    let updated = options::update_group(&txn, id, changes).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::OK, updated))
}

async fn deactivate_group(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let txn = db.begin().await?;
    let group = options::deactivate_group(&txn, id).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::OK, group))
}

async fn delete_group(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let txn = db.begin().await?;
    options::delete_group(&txn, id).await?;
    txn.commit().await?;
    Ok(respond(
        StatusCode::OK,
        json!({ "message": "Option group deleted successfully." }),
    ))
}

async fn add_value(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<NewOptionValue>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let input = payload(body)?;
    let txn = db.begin().await?;
    let value = options::add_value(&txn, id, input).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::CREATED, value))
}

async fn add_attribute(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<NewOptionAttribute>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let input = payload(body)?;
    let txn = db.begin().await?;
    let attribute = options::add_attribute(&txn, id, input).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::CREATED, attribute))
}

async fn deactivate_value(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let txn = db.begin().await?;
    let value = options::deactivate_value(&txn, id).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::OK, value))
}
