use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, post},
};

/// Private Router Module
///
/// Article management for the blog's single author. None of these handlers
/// look at the token themselves; the router-wide auth gate has already
/// rejected any request without a valid one.
pub fn private_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /private/post
        // Creates an article; absent `time` defaults to the creation timestamp.
        .route("/private/post", post(handlers::create_post))
        // POST /private/edit {id, ...fields}
        // Overwrites only the supplied fields.
        .route("/private/edit", post(handlers::edit_post))
        // DELETE /private/deletePost/{id}
        // Soft delete: the row is kept but hidden from every read.
        .route("/private/deletePost/{id}", delete(handlers::delete_post))
        .route("/private/deletePost", delete(handlers::missing_article_id))
}
