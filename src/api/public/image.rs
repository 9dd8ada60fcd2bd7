use axum::{
    body::Body,
    extract::Extension,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::api::{respond, ApiPath};
use crate::middleware::logging::to_response;
use crate::services::images::{self, ImageView};
use crate::services::ServiceError;
use crate::storage::ImageStore;

pub fn image_router() -> Router {
    Router::new()
        .route("/product-image/:id", get(get_image))
        .route("/product-image/:id/file", get(print_image))
}

async fn get_image(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ServiceError> {
    let image = images::get_image(db.as_ref(), id, true).await?;
    Ok(respond(StatusCode::OK, ImageView::from(image)))
}

/// Streams the stored file with a content type guessed from its extension.
pub async fn print_image(
    ApiPath(id): ApiPath<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(store): Extension<Arc<ImageStore>>,
) -> Result<Response, ServiceError> {
    let image = images::get_image(db.as_ref(), id, true).await?;
    let path = store.absolute(&image.image);

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|err| ServiceError::Storage(format!("{}: {err}", path.display())))?;

    let content_type = mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline"),
    );

    Ok(to_response((headers, body), Ok(())))
}
