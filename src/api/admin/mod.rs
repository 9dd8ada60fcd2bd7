pub mod category;
pub mod image;
pub mod option;
pub mod product;

use axum::{middleware::from_fn_with_state, Router};
use std::sync::Arc;

use category::admin_category_router;
use image::admin_image_router;
use option::admin_option_router;
use product::admin_product_router;

use crate::middleware::auth::{auth_middleware, AuthState, Role};

/// Back-office routes. Every route requires an admin bearer token and sees inactive rows.
pub fn admin_api_router(secret: Arc<String>, max_upload: usize) -> Router {
    Router::new()
        .merge(admin_category_router())
        .merge(admin_option_router())
        .merge(admin_product_router())
        .merge(admin_image_router(max_upload))
        .route_layer(from_fn_with_state(
            AuthState {
                secret,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}
