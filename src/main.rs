use std::error::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shop_catalog::config::Config;
use shop_catalog::{build_app, connect};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shop_catalog=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let db = connect(&config.database_url).await?;
    let app = build_app(db, &config);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "catalog service listening");
    axum::serve(listener, app).await?;
    Ok(())
}
