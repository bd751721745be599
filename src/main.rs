use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use reviewguard::agents::{ClaudeAgent, ModelClient};
use reviewguard::search::{SearchService, WebSearchClient};
use reviewguard::{config, db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reviewguard=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let model: Arc<dyn ModelClient> = Arc::new(ClaudeAgent::new(config.claude_api_key.clone()));

    let search = match (&config.search_api_key, &config.search_engine_id) {
        (Some(key), Some(engine_id)) => Arc::new(SearchService::new(
            Arc::new(WebSearchClient::new(key.clone(), engine_id.clone())),
            config.search_daily_quota,
        )),
        _ => {
            tracing::info!("web-similarity check disabled (no search API key configured)");
            Arc::new(SearchService::disabled())
        }
    };

    let state = Arc::new(state::AppState {
        pool,
        config: config.clone(),
        model,
        search,
    });

    let app = Router::new()
        .route("/api/reviews", post(routes::submit_review))
        .route(
            "/api/reviews/:id",
            get(routes::get_review)
                .put(routes::edit_review)
                .delete(routes::delete_review),
        )
        .route("/api/reviews/:id/reanalyze", post(routes::reanalyze_review))
        .route("/api/admin/reanalyze", post(routes::reanalyze_all))
        .route(
            "/api/admin/reviews/:id/moderate",
            post(routes::moderate_review),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Reviewguard listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
