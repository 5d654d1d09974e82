//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        llm::build_client, DbAdapter, EuropePmcAdapter, InMemoryStore, OpenAiAnswerAdapter,
        OpenAiKeywordAdapter, OpenAiSuggestionAdapter, OpenAiSummaryAdapter,
        OpenAiTranslationAdapter, PubMedAdapter,
    },
    config::{Config, LiteratureBackend},
    error::ApiError,
    web::{
        admin::{
            delete_user_handler, list_users_handler, quota_policy_handler,
            update_enabled_handler, update_role_handler,
        },
        auth::{login_handler, logout_handler, signup_handler},
        require_admin, require_auth,
        rest::{
            ask_query_handler, conversation_handler, guest_query_handler, list_queries_handler,
            suggestions_handler, usage_handler, ApiDoc,
        },
        state::AppState,
    },
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use medassist_core::orchestrator::ConversationServices;
use medassist_core::ports::BibliographicSearchService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let llm_client = build_client(&config.llm_api_key, config.llm_api_base.as_deref());
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| ApiError::Internal(format!("failed to build HTTP client: {}", e)))?;

    let search: Arc<dyn BibliographicSearchService> = match &config.literature_backend {
        LiteratureBackend::EuropePmc { base_url } => {
            info!("Literature backend: Europe PMC ({})", base_url);
            Arc::new(EuropePmcAdapter::new(http, base_url.clone()))
        }
        LiteratureBackend::PubMed { base_url, api_key } => {
            info!("Literature backend: PubMed ({})", base_url);
            Arc::new(PubMedAdapter::new(http, base_url.clone(), api_key.clone()))
        }
    };

    let services = ConversationServices {
        db: db_adapter,
        answers: Arc::new(OpenAiAnswerAdapter::new(llm_client.clone())),
        translator: Arc::new(OpenAiTranslationAdapter::new(
            llm_client.clone(),
            config.utility_model.clone(),
        )),
        keywords: Arc::new(OpenAiKeywordAdapter::new(
            llm_client.clone(),
            config.utility_model.clone(),
        )),
        search,
        summaries: Arc::new(OpenAiSummaryAdapter::new(
            llm_client.clone(),
            config.utility_model.clone(),
        )),
        suggestions: Arc::new(OpenAiSuggestionAdapter::new(
            llm_client,
            config.utility_model.clone(),
        )),
        local_store: Arc::new(InMemoryStore::new()),
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(config.clone(), services));

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static("x-guest-id"),
        ]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/guest/queries", post(guest_query_handler));

    // Admin routes (auth + admin role)
    let admin_routes = Router::new()
        .route("/admin/users", get(list_users_handler))
        .route("/admin/users/{id}", delete(delete_user_handler))
        .route("/admin/users/{id}/role", put(update_role_handler))
        .route("/admin/users/{id}/enabled", put(update_enabled_handler))
        .route("/admin/quota-policy", get(quota_policy_handler))
        .layer(axum_middleware::from_fn(require_admin));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/queries", post(ask_query_handler).get(list_queries_handler))
        .route("/queries/{id}/suggestions", post(suggestions_handler))
        .route("/usage", get(usage_handler))
        .route("/conversation", get(conversation_handler))
        .merge(admin_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
