use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use examprep_backend::{
    config::{get_config, init_config},
    database::{pool::create_pool, seed::seed_dimensions},
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    seed_dimensions(&pool).await?;

    let app_state = AppState::new(pool);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let user_api = Router::new()
        .route("/api/attempts", post(routes::attempts::start_attempt).get(routes::attempts::list_attempts))
        .route("/api/attempts/:id", get(routes::attempts::get_attempt))
        .route("/api/attempts/:id/result", post(routes::attempts::record_result))
        .route(
            "/api/attempts/sections/:id",
            patch(routes::attempts::update_section_progress),
        )
        .route(
            "/api/attempts/sections/:id/restart",
            post(routes::attempts::restart_section),
        )
        .route(
            "/api/attempts/sections/:id/answer",
            axum::routing::put(routes::attempts::record_answer),
        )
        .route("/api/events/login", post(routes::events::login_event))
        .layer(axum::middleware::from_fn(
            examprep_backend::middleware::auth::require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            examprep_backend::middleware::rate_limit::new_rps_state(config.public_rps),
            examprep_backend::middleware::rate_limit::rps_middleware,
        ));

    let admin_api = Router::new()
        .route(
            "/api/admin/reports/login-heatmap",
            get(routes::reporting::login_heatmap),
        )
        .route(
            "/api/admin/reports/login-heatmap/reset",
            post(routes::reporting::reset_login_heatmap),
        )
        .route(
            "/api/admin/reports/test-funnel",
            get(routes::reporting::test_funnel),
        )
        .layer(axum::middleware::from_fn(
            examprep_backend::middleware::auth::require_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            examprep_backend::middleware::rate_limit::new_rps_state(config.admin_rps),
            examprep_backend::middleware::rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(user_api)
        .merge(admin_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
