pub mod api;
mod config;
mod geo;
mod providers;
mod retry;
mod sync;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use sync::SyncManager;

#[derive(OpenApi)]
#[openapi(
    info(title = "Live Minibus API", version = "0.1.0"),
    paths(
        api::routes::list_routes,
        api::routes::get_route,
        api::routes::get_route_geometry,
        api::stops::list_stops,
        api::stops::stops_by_district,
        api::stops::nearest_stop,
        api::drivers::list_drivers,
        api::drivers::get_driver,
        api::drivers::push_driver_location,
        api::cadets::list_cadets,
        api::cadets::get_cadet,
        api::health::health_check,
    ),
    components(schemas(
        api::ErrorResponse,
        api::routes::RouteListResponse,
        api::routes::RouteSummary,
        api::routes::RouteDetail,
        api::routes::RouteStop,
        api::routes::RouteDriver,
        api::routes::RouteGeometryResponse,
        api::stops::StopListResponse,
        api::stops::StopView,
        api::stops::StopsByDistrictResponse,
        api::stops::NearestStopResponse,
        api::drivers::DriverListResponse,
        api::drivers::DriverView,
        api::drivers::DriverRoute,
        api::drivers::DriverDetail,
        api::drivers::DriverNearestStop,
        api::drivers::PushLocationRequest,
        api::cadets::CadetListResponse,
        api::cadets::CadetView,
        api::cadets::CadetDetail,
        api::cadets::CadetRoute,
        api::health::HealthResponse,
        providers::routing::GeoPoint,
        sync::DriverPositionUpdate,
    )),
    tags(
        (name = "routes", description = "Routes with aggregated geometry"),
        (name = "stops", description = "Minibus stops and nearest-stop search"),
        (name = "drivers", description = "Driver tracking and location pushes"),
        (name = "cadets", description = "Cadets and their assigned stops"),
        (name = "health", description = "Service health check")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    // Load config
    let config = Config::load("config.yaml").expect("Failed to load config");
    config.sync.validate();
    tracing::info!(
        backend = %config.backend.base_url,
        routing = %config.routing.base_url,
        "Loaded configuration"
    );

    // Build CORS layer based on config
    let cors_layer = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode explicitly enabled (all origins allowed) - DO NOT USE IN PRODUCTION");
        CorsLayer::permissive()
    } else if !config.cors_origins.is_empty() {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting to configured origins");
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        panic!("CORS configuration error: Either set 'cors_origins' with allowed origins, or set 'cors_permissive: true' for development");
    };

    // Start sync manager in background
    let sync_manager = Arc::new(
        SyncManager::new(config.clone()).expect("Failed to initialize sync manager"),
    );
    let sync_manager_clone = sync_manager.clone();
    tokio::spawn(async move {
        sync_manager_clone.start().await;
    });

    // Build the app
    let app = Router::new()
        .route("/", get(root))
        .nest("/api", api::router(sync_manager.clone(), config.average_speed_kmh))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("Failed to bind to port 3000");

    tracing::info!("Server running on http://localhost:3000");
    tracing::info!("Swagger UI: http://localhost:3000/swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sync_manager))
        .await
        .expect("Failed to start server");
}

/// Wait for Ctrl-C, then stop in-flight geometry runs before the server drains
async fn shutdown_signal(sync_manager: Arc<SyncManager>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
    sync_manager.shutdown();
}

async fn root() -> &'static str {
    "Live Minibus API"
}
