use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::api::{payload, respond, ApiPath, ApiQuery};
use crate::services::products::{self, NewProduct, ProductChanges, ProductFilter};
use crate::services::ServiceError;
use crate::storage::ImageStore;

pub fn admin_product_router() -> Router {
    Router::new()
        .route("/product", get(get_products).post(create_product))
        .route(
            "/product/:id",
            get(get_product).patch(patch_product).delete(delete_product),
        )
        .route("/product/:id/option-group", post(attach_option_group))
        .route(
            "/product/:id/option-group/:group_id",
            delete(detach_option_group),
        )
        .route("/product/:id/attribute-value", post(set_attribute_value))
        .route(
            "/product/:id/attribute-value/:value_id",
            delete(remove_attribute_value),
        )
}

#[derive(Debug, Deserialize)]
struct ProductGroupPath {
    id: i32,
    group_id: i32,
}

#[derive(Debug, Deserialize)]
struct ProductValuePath {
    id: i32,
    value_id: i32,
}

#[derive(Debug, Deserialize)]
struct OptionGroupPayload {
    option_group_id: i32,
}

#[derive(Debug, Deserialize)]
struct AttributeValuePayload {
    option_value_id: i32,
}

async fn get_products(
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let filter = ProductFilter::from_query(&params)?;
    let products = products::list_products(db.as_ref(), filter, false).await?;
    Ok(respond(StatusCode::OK, products))
}

async fn get_product(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let product = products::product_detail(db.as_ref(), id, false).await?;
    Ok(respond(StatusCode::OK, product))
}

async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let input = payload(body)?;
    let txn = db.begin().await?;
    let created = products::create_product(&txn, input).await?;
    let detail = products::product_detail(&txn, created.id, false).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::CREATED, detail))
}

async fn patch_product(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<ProductChanges>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let changes = payload(body)?;
    let txn = db.begin().await?;
    products::update_product(&txn, id, changes).await?;
    let detail = products::product_detail(&txn, id, false).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::OK, detail))
}

async fn delete_product(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(store): Extension<Arc<ImageStore>>,
) -> Result<Response, ServiceError> {
    let txn = db.begin().await?;
    let image_paths = products::delete_product(&txn, id).await?;
    txn.commit().await?;

    // The rows are gone; a file that cannot be removed is only logged.
    for path in &image_paths {
        if let Err(err) = store.remove(path).await {
            warn!(product_id = id, path = %path, error = %err, "failed to remove image file");
        }
    }

    Ok(respond(
        StatusCode::OK,
        json!({
            "message": "Product deleted successfully.",
            "removed_images": image_paths.len(),
        }),
    ))
}

async fn attach_option_group(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<OptionGroupPayload>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let OptionGroupPayload { option_group_id } = payload(body)?;
    let txn = db.begin().await?;
    let link = products::attach_option_group(&txn, id, option_group_id).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::CREATED, link))
}

async fn detach_option_group(
    ApiPath(ProductGroupPath { id, group_id }): ApiPath<ProductGroupPath>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let txn = db.begin().await?;
    products::detach_option_group(&txn, id, group_id).await?;
    txn.commit().await?;
    Ok(respond(
        StatusCode::OK,
        json!({ "message": "Option group detached." }),
    ))
}

async fn set_attribute_value(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<AttributeValuePayload>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let AttributeValuePayload { option_value_id } = payload(body)?;
    let txn = db.begin().await?;
    let link = products::set_attribute_value(&txn, id, option_value_id).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::CREATED, link))
}

async fn remove_attribute_value(
    ApiPath(ProductValuePath { id, value_id }): ApiPath<ProductValuePath>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let txn = db.begin().await?;
    products::remove_attribute_value(&txn, id, value_id).await?;
    txn.commit().await?;
    Ok(respond(
        StatusCode::OK,
        json!({ "message": "Attribute value removed." }),
    ))
}
