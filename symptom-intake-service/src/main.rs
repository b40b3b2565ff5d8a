use std::time::Duration;

use symptom_intake_service::{ServiceConfig, create_app, spawn_session_sweeper};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("symptom_intake_service=debug,symptom_flow=debug,tower_http=debug")
    });

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("pretty")) {
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let config = ServiceConfig::from_env()?;
    let (app, state) = create_app(&config).await?;
    spawn_session_sweeper(state.engine.clone(), config.session_idle, SWEEP_INTERVAL);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Symptom Intake Service starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Chat endpoint: POST http://{}/api/chat", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
