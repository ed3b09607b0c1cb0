use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use deapi_txt2img_rmcp::{
    deapi::DeapiClient,
    mcp_server::Txt2ImgServer,
    store::{GenerationCache, MetadataStore},
};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use tower_http::services::ServeDir;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let port = env::var("MCP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000);
    let bind_address = format!("0.0.0.0:{}", port);

    let secret_key = env::var("SECRET_KEY").ok().filter(|value| !value.trim().is_empty());
    let mcp_path = match secret_key.as_deref() {
        Some(value) => format!("/{}/mcp", value),
        None => "/mcp".to_string(),
    };

    let images_root = resolve_images_root();
    tokio::fs::create_dir_all(&images_root).await?;

    let client = DeapiClient::new();
    let cache = Arc::new(GenerationCache::new());
    let store = Arc::new(MetadataStore::new(images_root.clone()));
    let service = StreamableHttpService::new(
        move || Ok(Txt2ImgServer::new(client.clone(), cache.clone(), store.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new()
        .nest_service(&mcp_path, service)
        .nest_service("/images", ServeDir::new(images_root));
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;

    println!(
        "deapi txt2img MCP HTTP server started at http://{}{}",
        bind_address, mcp_path
    );

    let _ = axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async { let _ = tokio::signal::ctrl_c().await; })
        .await;
    Ok(())
}

fn resolve_images_root() -> PathBuf {
    env::var("IMAGES_DIR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("static/images/ai-generated"))
}
