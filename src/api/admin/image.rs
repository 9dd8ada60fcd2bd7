use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Extension, Multipart},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::api::{payload, respond, ApiPath};
use crate::services::images::{self, ImageOrder, ImageView, NewImage};
use crate::services::ServiceError;
use crate::storage::ImageStore;

/// Room for the text fields that travel with the file.
const FORM_OVERHEAD: usize = 64 * 1024;

pub fn admin_image_router(max_upload: usize) -> Router {
    Router::new()
        .route(
            "/product-image",
            post(upload).layer(DefaultBodyLimit::max(max_upload + FORM_OVERHEAD)),
        )
        .route("/product-image/:id", get(get_image).delete(delete_image))
        .route("/product-image/:id/deactivate", post(deactivate_image))
        .route("/product/:id/images", get(get_product_images))
        .route("/product/:id/images/order", put(reorder_images))
}

async fn upload(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(store): Extension<Arc<ImageStore>>,
    mut multipart: Multipart,
) -> Result<Response, ServiceError> {
    let mut product_id = None;
    let mut index = 0;
    let mut alt_text = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "product" => product_id = Some(number_field(&name, field.text().await)?),
            "index" => index = number_field(&name, field.text().await)?,
            "alt_text" => alt_text = Some(field.text().await.map_err(multipart_error)?),
            "image" => {
                let file_name = field
                    .file_name()
                    .map(str::to_owned)
                    .ok_or_else(|| ServiceError::validation("image", "file name is not set"))?;
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let product_id =
        product_id.ok_or_else(|| ServiceError::validation("product", "field is required"))?;
    let (file_name, bytes) =
        file.ok_or_else(|| ServiceError::validation("image", "field is required"))?;

    let txn = db.begin().await?;
    let created = images::add_image(
        &txn,
        &store,
        NewImage {
            product_id,
            file_name,
            bytes,
            index,
            alt_text,
        },
    )
    .await?;

    if let Err(err) = txn.commit().await {
        // The file was written before the commit failed.
        if let Err(remove_err) = store.remove(&created.image).await {
            warn!(path = %created.image, error = %remove_err, "failed to remove orphaned image file");
        }
        return Err(err.into());
    }

    Ok(respond(StatusCode::CREATED, ImageView::from(created)))
}

async fn get_image(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let image = images::get_image(db.as_ref(), id, false).await?;
    Ok(respond(StatusCode::OK, ImageView::from(image)))
}

async fn deactivate_image(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let txn = db.begin().await?;
    let image = images::deactivate(&txn, id).await?;
    txn.commit().await?;
    Ok(respond(StatusCode::OK, ImageView::from(image)))
}

async fn delete_image(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(store): Extension<Arc<ImageStore>>,
) -> Result<Response, ServiceError> {
    let txn = db.begin().await?;
    let image = images::delete_image(&txn, id).await?;
    txn.commit().await?;

    if let Err(err) = store.remove(&image.image).await {
        warn!(image_id = id, path = %image.image, error = %err, "failed to remove image file");
    }

    Ok(respond(
        StatusCode::OK,
        json!({ "message": "Image deleted successfully." }),
    ))
}

async fn get_product_images(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let gallery: Vec<ImageView> = images::list_images(db.as_ref(), id, false)
        .await?
        .into_iter()
        .map(ImageView::from)
        .collect();
    Ok(respond(StatusCode::OK, gallery))
}

async fn reorder_images(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    body: Result<Json<ImageOrder>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let ImageOrder { image_ids } = payload(body)?;
    let txn = db.begin().await?;
    let gallery = images::reorder(&txn, id, &image_ids).await?;
    txn.commit().await?;
    let gallery: Vec<ImageView> = gallery.into_iter().map(ImageView::from).collect();
    Ok(respond(StatusCode::OK, gallery))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ServiceError {
    ServiceError::validation("image", err.body_text())
}

fn number_field(
    name: &str,
    text: Result<String, axum::extract::multipart::MultipartError>,
) -> Result<i32, ServiceError> {
    let text = text.map_err(multipart_error)?;
    text.trim()
        .parse()
        .map_err(|_| ServiceError::validation(name, format!("'{text}' is not a whole number")))
}
