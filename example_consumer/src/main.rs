//! Example consumer: serves the models in `MODELS_PATH` through model-rest.
//!
//! Run from repo root: `MODELS_PATH=example_consumer/models.json cargo run -p example-consumer`
//! Without `DATABASE_URL` the models are served from the in-memory session.

use axum::{extract::Request, middleware::Next, response::Response};
use model_rest::{common_routes, load_models_from_path, MemorySession, PgSession, Registrar, Session, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    tracing::info!(%method, %uri, status = response.status().as_u16(), "request");
    response
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("model_rest=info,example_consumer=info")),
        )
        .init();

    let session: Arc<dyn Session> = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            Arc::new(PgSession::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory session");
            Arc::new(MemorySession::new())
        }
    };

    let models = load_models_from_path(&settings.models_path).await?;
    let resources = Registrar::from_settings(session.clone(), &settings)
        .decorator(|r| r.layer(axum::middleware::from_fn(log_request)))
        .register(&models)?;

    let app = common_routes(session).merge(resources);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
