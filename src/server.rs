use crate::applications::InMemoryApplicationRepository;
use crate::cli::ServeArgs;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::export::ExportService;
use crate::infra::AppState;
use crate::program::ProgramService;
use crate::routes::router;
use crate::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let repository = Arc::new(InMemoryApplicationRepository::default());
    let programs = Arc::new(ProgramService::new());
    let exports = Arc::new(ExportService::new(repository, &config.portal));

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        programs,
        exports,
    };

    let app = router().layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "benefit portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
