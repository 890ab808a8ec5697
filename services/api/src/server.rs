use crate::cli::ServeArgs;
use crate::infra::{load_catalog, AppState, Services};
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use visa_desk::clock::SystemClock;
use visa_desk::config::AppConfig;
use visa_desk::error::AppError;
use visa_desk::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = load_catalog(&config.catalog)?;
    let services = Services::build(
        catalog,
        config.scheduling.clone(),
        Arc::new(SystemClock),
    );
    services.seed_agents(&args.agents)?;

    let app = with_workflow_routes(&services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        agents = args.agents.len(),
        "visa desk ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
