use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carequery::config::Config;
use carequery::services::session_store::SessionStore;
use carequery::services::{
    CatalogService, ChatOrchestrator, ConceptLibrary, GuardedExecutor, LlmClient,
    LoginRateLimiter, UserStore,
};
use carequery::utils::JwtUtil;
use carequery::{handlers, middleware, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    // Keep the appender guard alive for the life of the process
    let mut _log_guard = None;
    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("carequery.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _log_guard = Some(guard);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("CareQuery starting up");
    tracing::info!("Configuration loaded successfully");

    // Schema catalog is a startup requirement; an unreadable source is fatal
    let catalog = Arc::new(CatalogService::load(config.schema_dir())?);

    let executor = Arc::new(GuardedExecutor::connect(&config.database, &config.limits).await?);
    if executor.test_connection().await {
        tracing::info!("Database connection successful");
    } else {
        tracing::warn!("Database connection failed - queries will not work");
    }

    let user_store = Arc::new(UserStore::load(
        &config.users_csv_path(),
        &config.super_users_path(),
    ));
    tracing::info!("User store loaded: {} users", user_store.user_count());

    let concepts = Arc::new(ConceptLibrary::load(&config.concepts_path())?);
    let sessions = Arc::new(SessionStore::new(config.session.ttl_hours));
    let login_limiter = Arc::new(LoginRateLimiter::default());
    let jwt_util = Arc::new(JwtUtil::new(
        &config.auth.secret_key,
        config.auth.session_max_age_secs,
    ));

    let llm = Arc::new(LlmClient::new(&config.llm, config.limits.max_rows));
    tracing::info!("LLM client initialized (model: {})", config.llm.model_name);

    let orchestrator = Arc::new(ChatOrchestrator::new(
        Arc::clone(&catalog),
        Arc::clone(&llm),
        Arc::clone(&executor),
        Arc::clone(&sessions),
        Arc::clone(&concepts),
        config.limits.clone(),
    ));

    let app_state = Arc::new(AppState {
        catalog: Arc::clone(&catalog),
        executor: Arc::clone(&executor),
        orchestrator: Arc::clone(&orchestrator),
        user_store: Arc::clone(&user_store),
        login_limiter: Arc::clone(&login_limiter),
        jwt_util: Arc::clone(&jwt_util),
        session_cookie_name: config.auth.session_cookie.clone(),
    });

    let auth_state = middleware::AuthState {
        jwt_util: Arc::clone(&jwt_util),
        cookie_name: config.auth.session_cookie.clone(),
    };

    let public_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/health", get(handlers::health::health))
        .with_state(Arc::clone(&app_state));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/admin/schema/stats", get(handlers::schema::schema_stats))
        .route("/api/admin/schema/reload", post(handlers::schema::reload_schema))
        .with_state(Arc::clone(&app_state))
        .layer(axum_middleware::from_fn_with_state(auth_state, middleware::auth_middleware));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("CareQuery is ready to serve requests");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
