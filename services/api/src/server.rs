use crate::cli::ServeArgs;
use crate::infra::{apply_data_dir, AppState, RuleState};
use crate::routes::guideline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use guideline_engine::config::AppConfig;
use guideline_engine::error::AppError;
use guideline_engine::telemetry;
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
    apply_data_dir(&mut config.rules, args.data_dir.take());

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let rules = RuleState::load(&config.rules)?;

    let app = guideline_routes(rules)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "guideline decision engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
