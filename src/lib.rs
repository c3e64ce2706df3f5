use axum::{Router, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod account;
pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Routing split along the public/private path partition.
pub mod routes;
use routes::{private, public};

// --- Public Re-exports ---

pub use account::AuthService;
pub use auth::TokenService;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{
    ArticleStore, ArticleStoreState, InMemoryRepository, PostgresRepository, UserStore,
    UserStoreState,
};

/// ApiDoc
///
/// OpenAPI description of every route, served by Swagger UI under the public
/// prefix.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_posts, handlers::list_by_category, handlers::list_by_tag,
        handlers::get_categories, handlers::get_tags, handlers::get_content,
        handlers::get_archive, handlers::register, handlers::login,
        handlers::create_post, handlers::edit_post, handlers::delete_post
    ),
    components(
        schemas(
            models::Article, models::ArticlePage, models::ArticleRequest,
            models::EditArticleRequest, models::PageRequest, models::CategoryRequest,
            models::TagRequest, models::CategoryCount, models::TagCount,
            models::CategoriesSummary, models::TagsSummary, models::Credentials,
            models::AuthPayload, models::PublicUser,
        )
    ),
    tags(
        (name = "uncode-blog", description = "Blog publishing API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container handed to every handler and to the auth gate.
/// Everything inside is cheap to clone (`Arc`s and small config values).
#[derive(Clone)]
pub struct AppState {
    /// Article persistence.
    pub articles: ArticleStoreState,
    /// Registration and login over the user store.
    pub accounts: AuthService,
    /// Token signer/verifier used by the auth gate.
    pub tokens: TokenService,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the stores and the token service together. `users` is only
    /// reachable through `accounts`.
    pub fn new(articles: ArticleStoreState, users: UserStoreState, config: AppConfig) -> Self {
        let tokens = TokenService::new(&config.jwt_secret);
        Self {
            articles,
            accounts: AuthService::new(users, tokens.clone()),
            tokens,
            config,
        }
    }
}

/// create_router
///
/// Assembles the routing table, the auth gate and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Normalized by `AppConfig::load`: leading slash, no trailing slash, not "/".
    let prefix = state.config.public_prefix.clone();

    let base_router = Router::new()
        .merge(
            SwaggerUi::new(format!("{prefix}/swagger-ui"))
                .url(format!("{prefix}/api-docs/openapi.json"), ApiDoc::openapi()),
        )
        .nest(&prefix, public::public_routes())
        .merge(private::private_routes())
        // Router-wide (not route_layer) so unknown private paths are also
        // answered with 401 instead of 404.
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_gate))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with the `x-request-id` set by the outer layer.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
