use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{routing::get, Router};
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use refback_common::Config;
use refback_receiver::pipeline::CommentStore;
use refback_receiver::{HttpFetcher, LogNotifier, RefbackReceiver, RefbackWorker};

mod routes;
mod site;
mod store;

use site::Site;
use store::MemoryCommentStore;

pub struct AppState {
    pub site: Arc<Site>,
    pub store: Arc<dyn CommentStore>,
    pub receiver: RefbackReceiver,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("refback_receiver=info".parse()?)
                .add_directive("refback_server=info".parse()?),
        )
        .init();

    let config = Config::from_env();

    let site = Arc::new(Site::with_sample_posts(&config.site_url)?);
    let store: Arc<dyn CommentStore> = Arc::new(MemoryCommentStore::new());
    let fetcher = Arc::new(HttpFetcher::new(
        Duration::from_secs(config.fetch_timeout_secs),
        &config.fetch_user_agent,
    ));
    let notifier = Arc::new(LogNotifier);

    let (signal_tx, signal_rx) = mpsc::channel(config.queue_capacity);
    let (shutdown_tx, _) = broadcast::channel(1);

    let worker = RefbackWorker::new(fetcher, site.clone(), store.clone(), notifier.clone());
    let worker_handle = worker.spawn(signal_rx, shutdown_tx.subscribe());

    let receiver = RefbackReceiver::new(signal_tx, notifier, config.force_ssl);

    let state = Arc::new(AppState {
        site,
        store,
        receiver,
    });

    let app = Router::new()
        // Post index
        .route("/", get(routes::index))
        // Post pages: every hit feeds the refback receiver
        .route("/posts/{slug}", get(routes::post_page))
        // Moderation view
        .route("/posts/{slug}/comments", get(routes::post_comments))
        .with_state(state)
        // Logging layer: method + path only (no referer, no IP)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    info!("Refback server starting on {}", config.bind_addr);
    info!("Serving refbacks for {}", config.site_url);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
        let _ = shutdown_tx.send(());
    })
    .await?;

    worker_handle.await?;

    Ok(())
}
