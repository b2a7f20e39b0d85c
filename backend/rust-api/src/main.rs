use guarani_api::{
    config::Config, create_router, services::chat_service::ChatService, services::AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 8081;

#[tokio::main]
async fn main() {
    let tracer = init_telemetry();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guarani_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    tracing::info!("Starting Guaraní learning API");

    let config = Config::load().expect("Failed to load configuration");
    tracing::info!(
        "Configuration loaded for environment: {} (storage: {:?})",
        config.app_env,
        config.storage_backend
    );

    let app_state = Arc::new(
        AppState::new(config)
            .await
            .expect("Failed to initialize application state"),
    );

    ChatService::new(&app_state)
        .seed_modes()
        .await
        .expect("Failed to seed conversation modes");

    let app = create_router(app_state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("Failed to bind listener");

    tracing::info!("Server listening on port {}", port);

    axum::serve(listener, app).await.expect("Server error");

    shutdown_telemetry();
}

fn init_telemetry() -> opentelemetry_sdk::trace::Tracer {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4318".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_endpoint)
        .build()
        .expect("Failed to create OTLP exporter");

    let resource = Resource::builder_empty()
        .with_service_name("guarani-api")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer("guarani-api");
    opentelemetry::global::set_tracer_provider(provider);

    tracer
}

fn shutdown_telemetry() {
    // The global provider flushes its batch exporter when dropped.
    tracing::info!("Shutting down OpenTelemetry");
}
