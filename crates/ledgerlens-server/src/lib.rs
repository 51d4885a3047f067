//! Ledgerlens Web Server
//!
//! Axum-based REST API for natural-language ledger search.
//!
//! Security features:
//! - Cloudflare Access header or per-user API keys (secure by default, use
//!   --no-auth for local dev)
//! - Restrictive CORS policy
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use ledgerlens_core::ai::{AIBackend, AIClient};
use ledgerlens_core::response::Reply;
use ledgerlens_core::search::{SearchError, SearchService};

mod handlers;

/// Cloudflare Access header for authenticated user email
const CF_ACCESS_USER_HEADER: &str = "cf-access-authenticated-user-email";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Caller identity when authentication is disabled
pub const LOCAL_DEV_USER: &str = "local-dev";

/// An API key and the user it authenticates
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKey {
    pub user: String,
    pub key: String,
}

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys accepted as `Authorization: Bearer <key>`
    pub api_keys: Vec<ApiKey>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub search: SearchService,
    /// Model backend, kept for health reporting
    pub backend: AIClient,
    pub config: ServerConfig,
}

/// The caller, as established by `auth_middleware`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Authentication middleware - resolves the caller from the Cloudflare Access
/// header or an API key and attaches it to the request
///
/// # Security Notes
///
/// **Cloudflare Access header**: `CF-Access-Authenticated-User-Email` is safe
/// behind Cloudflare Tunnel (which strips/rewrites CF headers), but can be
/// spoofed if the server is exposed directly to the internet.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        request
            .extensions_mut()
            .insert(AuthenticatedUser(LOCAL_DEV_USER.to_string()));
        return next.run(request).await;
    }

    let cf_user = request
        .headers()
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from);

    if let Some(email) = cf_user {
        info!(user = %email, path = %request.uri().path(), "Authenticated via Cloudflare Access header");
        request.extensions_mut().insert(AuthenticatedUser(email));
        return next.run(request).await;
    }

    let api_key_user = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .and_then(|key| user_for_api_key(key.trim(), &state.config.api_keys));

    if let Some(user) = api_key_user {
        info!(user = %user, path = %request.uri().path(), "Authenticated via API key");
        request.extensions_mut().insert(AuthenticatedUser(user));
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    search_reply(Reply::from_error(&SearchError::AuthRequired))
}

/// Find the user owning `provided`, comparing every key in constant time
fn user_for_api_key(provided: &str, keys: &[ApiKey]) -> Option<String> {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    let mut found = None;

    for entry in keys {
        let key_bytes = entry.key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes)) {
            found = Some(entry.user.clone());
        }
    }
    found
}

/// Parse `user:key` pairs separated by commas
///
/// Entries without a user or key are skipped with a warning. The key may
/// itself contain `:`.
pub fn parse_api_keys(input: &str) -> Vec<ApiKey> {
    input
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match entry.split_once(':') {
                Some((user, key)) if !user.trim().is_empty() && !key.trim().is_empty() => {
                    Some(ApiKey {
                        user: user.trim().to_string(),
                        key: key.trim().to_string(),
                    })
                }
                _ => {
                    warn!("Ignoring malformed API key entry (expected user:key)");
                    None
                }
            }
        })
        .collect()
}

/// Render a core `Reply` as an HTTP response
pub(crate) fn search_reply(reply: Reply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body)).into_response()
}

/// Create the application router
pub fn create_router(search: SearchService, backend: AIClient, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        search,
        backend,
        config: config.clone(),
    });

    let api_routes = Router::new()
        .route("/search", post(handlers::search))
        .route("/usage", get(handlers::get_usage))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        // Health is public so load balancers can probe it
        .route("/health", get(handlers::health));

    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve_with_config(
    search: SearchService,
    backend: AIClient,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        info!("No API keys configured; only Cloudflare Access callers can authenticate");
    }

    check_ai_connection(&backend).await;

    let app = create_router(search, backend, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log model backend connection status
async fn check_ai_connection(backend: &AIClient) {
    if backend.health_check().await {
        info!(
            "✅ Model backend connected: {} {} (model: {})",
            backend.kind(),
            backend.host(),
            backend.model()
        );
    } else {
        warn!(
            "⚠️  Model backend configured but not responding: {} {} (model: {})",
            backend.kind(),
            backend.host(),
            backend.model()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Internal failure outside the search pipeline
///
/// The client sees a generic message; the full error goes to the log.
pub struct AppError {
    internal: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.internal, "Internal error");
        search_reply(Reply::from_error(&SearchError::Internal(
            self.internal.to_string(),
        )))
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            internal: err.into(),
        }
    }
}
