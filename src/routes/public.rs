use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints the auth gate lets through without a token. Paths are relative;
/// `create_router` nests this router under the configured public prefix
/// (`/public` by default). Every read here sees active (not soft-deleted)
/// articles only.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers; touches no storage.
        .route("/health", get(|| async { "ok" }))
        // POST /posts {page?, pageSize?}
        // Paginated article list, ordered by id.
        .route("/posts", post(handlers::list_posts))
        // GET /categories, GET /tags
        // Article counts grouped by category / tag.
        .route("/categories", get(handlers::get_categories))
        .route("/tags", get(handlers::get_tags))
        // GET /content/{id}
        // A single article. The id-less form answers with a validation envelope.
        .route("/content/{id}", get(handlers::get_content))
        .route("/content", get(handlers::missing_article_id))
        // POST /category {category, page?, pageSize?}
        // POST /tag {tag, page?, pageSize?}
        .route("/category", post(handlers::list_by_category))
        .route("/tag", post(handlers::list_by_tag))
        // GET /archive
        // Every article, newest first.
        .route("/archive", get(handlers::get_archive))
        // POST /register, POST /login
        // Both answer with {token, userInfo} on success.
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
}
