//! `serve` — the JSON API server.

use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use hackreg_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::settings::Settings;

pub async fn run(settings: &Settings, store: SqliteStore) -> anyhow::Result<()> {
  let app = Router::new()
    .nest(
      "/api",
      hackreg_api::api_router(Arc::new(store), settings.groups.well_known()),
    )
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", settings.api.host, settings.api.port);
  tracing::info!("listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
