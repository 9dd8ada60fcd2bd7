use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::{respond, ApiPath, ApiQuery};
use crate::services::images::{self, ImageView};
use crate::services::products::{self, ProductFilter};
use crate::services::ServiceError;

pub fn product_router() -> Router {
    Router::new()
        .route("/product", get(get_products))
        .route("/product/:id", get(get_product))
        .route("/product/:id/images", get(get_product_images))
}

async fn get_products(
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let filter = ProductFilter::from_query(&params)?;
    let products = products::list_products(db.as_ref(), filter, true).await?;
    Ok(respond(StatusCode::OK, products))
}

async fn get_product(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let product = products::product_detail(db.as_ref(), id, true).await?;
    Ok(respond(StatusCode::OK, product))
}

async fn get_product_images(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let gallery: Vec<ImageView> = images::list_images(db.as_ref(), id, true)
        .await?
        .into_iter()
        .map(ImageView::from)
        .collect();
    Ok(respond(StatusCode::OK, gallery))
}
