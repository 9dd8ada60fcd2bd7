pub mod api;
pub mod config;
pub mod entities;
pub mod middleware;
pub mod pricing;
pub mod services;
pub mod slug;
pub mod storage;

use axum::Router;
use sea_orm::{Database, DatabaseConnection, DbErr};
use std::sync::Arc;

use crate::api::create_api_router;
use crate::config::Config;
use crate::entities::setup_schema;
use crate::storage::ImageStore;

/// Opens the database and makes sure every catalog table exists.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;
    setup_schema(&db).await?;
    Ok(db)
}

/// The complete HTTP application for `config`.
pub fn build_app(db: DatabaseConnection, config: &Config) -> Router {
    create_api_router(
        Arc::new(db),
        Arc::new(ImageStore::new(
            config.upload_dir.clone(),
            config.file_size_limit,
        )),
        Arc::new(config.secret.clone()),
    )
}
