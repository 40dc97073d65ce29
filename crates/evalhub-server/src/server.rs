use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{delete, get, post},
};
use evalhub_auth::{AuthState, SessionAuthenticator};
use evalhub_core::HierarchyConfig;
use evalhub_db_memory::{InMemorySessionStorage, InMemoryStorage};
use evalhub_storage::DynStorage;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    bootstrap, config::AppConfig, handlers, join::JoinResourceHandler,
    middleware as app_middleware, resolver::ResourceResolver, storage_adapter::StoragePrincipals,
};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: DynStorage,
    pub hierarchy: Arc<HierarchyConfig>,
    pub resolver: ResourceResolver,
    pub joins: JoinResourceHandler,
    pub auth: AuthState,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    /// Wires the in-memory backend, resolver, join handler and authenticator.
    pub fn new(cfg: &AppConfig) -> anyhow::Result<Self> {
        let hierarchy = Arc::new(
            cfg.hierarchy_config()
                .map_err(|e| anyhow::anyhow!("hierarchy config error: {e}"))?,
        );
        let storage: DynStorage = Arc::new(InMemoryStorage::with_hierarchy(&hierarchy));
        let authenticator = SessionAuthenticator::new(
            Arc::new(InMemorySessionStorage::new()),
            Arc::new(StoragePrincipals::new(storage.clone())),
            &cfg.auth,
        );
        tracing::info!(
            backend = storage.backend_name(),
            session_ttl_secs = cfg.auth.session_ttl.as_secs(),
            "application state initialized"
        );

        Ok(Self {
            resolver: ResourceResolver::new(hierarchy.clone(), storage.clone()),
            joins: JoinResourceHandler::new(hierarchy.clone(), storage.clone()),
            auth: AuthState::new(Arc::new(authenticator)),
            config: Arc::new(cfg.clone()),
            hierarchy,
            storage,
        })
    }
}

/// Builds the router, seeding bootstrap data first.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::new(cfg)?;
    bootstrap::seed(&state.storage, &cfg.bootstrap).await?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    Router::new()
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .nest("/api", api_routes())
        .with_state(state)
        // Middleware stack (order: request id -> compression/cors/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

// Path parameters keep one name per position (`{institution_id}`,
// `{evaluation_id}`, ...) because the router rejects differently named
// parameters at the same segment. Only true leaves use `{id}`.
fn api_routes() -> Router<AppState> {
    use handlers::{
        answers, evaluation_questions, evaluations, institutions, questions, sessions, users,
    };

    const INSTITUTION: &str = "/institutions/{institution_id}";
    const EVALUATION: &str = "/institutions/{institution_id}/evaluations/{evaluation_id}";
    const QUESTION: &str = "/institutions/{institution_id}/questions/{question_id}";
    const EVALUATION_QUESTION: &str = "/institutions/{institution_id}/evaluations/{evaluation_id}/evaluation_questions/{evaluation_question_id}";

    Router::new()
        // Sessions
        .route(
            &format!("{INSTITUTION}/users/sign_in"),
            post(sessions::sign_in),
        )
        .route("/users/sign_out", delete(sessions::sign_out))
        // Institutions and users
        .route(
            "/institutions",
            get(institutions::index).post(institutions::create),
        )
        .route(
            INSTITUTION,
            get(institutions::show)
                .patch(institutions::update)
                .delete(institutions::destroy),
        )
        .route(&format!("{INSTITUTION}/users/{{id}}"), get(users::show))
        // Evaluations
        .route(
            &format!("{INSTITUTION}/evaluations"),
            get(evaluations::index).post(evaluations::create),
        )
        .route(
            EVALUATION,
            get(evaluations::show)
                .patch(evaluations::update)
                .delete(evaluations::destroy),
        )
        .route(&format!("{EVALUATION}/restore"), post(evaluations::restore))
        .route(&format!("{EVALUATION}/join"), get(evaluations::join))
        .route(
            &format!("{EVALUATION}/responses"),
            get(evaluations::responses),
        )
        // Questions
        .route(
            &format!("{INSTITUTION}/questions"),
            get(questions::index).post(questions::create),
        )
        .route(
            QUESTION,
            get(questions::show)
                .patch(questions::update)
                .delete(questions::destroy),
        )
        .route(&format!("{QUESTION}/restore"), post(questions::restore))
        // Evaluation questions (join resource)
        .route(
            &format!("{EVALUATION}/questions"),
            get(evaluation_questions::index).post(evaluation_questions::create),
        )
        .route(
            &format!("{EVALUATION}/questions/{{question_id}}"),
            axum::routing::patch(evaluation_questions::update)
                .delete(evaluation_questions::destroy),
        )
        .route(EVALUATION_QUESTION, get(evaluation_questions::show))
        // Answers
        .route(&format!("{EVALUATION}/answers"), get(answers::index))
        .route(
            &format!("{EVALUATION}/answers/bulk_create"),
            post(answers::bulk_create),
        )
        .route(
            &format!("{EVALUATION_QUESTION}/answers"),
            post(answers::create),
        )
        .route(
            &format!("{EVALUATION_QUESTION}/answers/{{id}}"),
            get(answers::show)
                .patch(answers::update)
                .delete(answers::destroy),
        )
}

pub struct EvalhubServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<EvalhubServer> {
        let app = build_app(&self.config).await?;

        Ok(EvalhubServer {
            addr: self.addr,
            app,
        })
    }
}

impl EvalhubServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
