pub mod category;
pub mod image;
pub mod option;
pub mod product;

use axum::Router;

use category::category_router;
use image::image_router;
use option::option_router;
use product::product_router;

/// Storefront routes. Inactive rows are invisible here.
pub fn public_api_router() -> Router {
    Router::new()
        .merge(category_router())
        .merge(option_router())
        .merge(product_router())
        .merge(image_router())
}
