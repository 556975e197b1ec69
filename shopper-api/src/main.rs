use std::sync::Arc;
use std::time::Duration;

use shopper_shared::clients::db::create_pool;
use shopper_shared::clients::rabbitmq::RabbitMQClient;

mod config;
mod domain;
mod events;
mod models;
mod routes;
mod schema;
mod services;
mod store;

use config::AppConfig;
use events::{EventSink, LogSink, RabbitSink};
use routes::AppState;
use services::MissionService;
use store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shopper_shared::middleware::init_tracing("shopper-api");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration, refusing to start");
            std::process::exit(1);
        }
    };
    let port = config.port;

    let pool = create_pool(
        &config.database_url(),
        config.db_connection_limit,
        Duration::from_secs(config.db_connect_timeout_secs),
    )?;

    let events: Arc<dyn EventSink> = match &config.rabbitmq_url {
        Some(url) => {
            let client = RabbitMQClient::connect(url).await?;
            Arc::new(RabbitSink::new(client, tokio::runtime::Handle::current()))
        }
        None => {
            tracing::warn!("no RabbitMQ url configured, lifecycle events will only be logged");
            Arc::new(LogSink)
        }
    };

    let metrics = shopper_shared::middleware::init_metrics()?;
    let missions = MissionService::new(Arc::new(PgStore::new(pool)), events, config.refusal_policy);
    tracing::info!(policy = ?config.refusal_policy, "refusal policy selected");

    let state = Arc::new(AppState { config, missions, metrics });
    let app = routes::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "shopper-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
