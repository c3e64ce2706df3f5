use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{Article, ArticlePatch, CategoryCount, NewArticle, Page, TagCount, User},
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// ArticleStore
///
/// Persistence contract for articles. Every read excludes soft-deleted rows;
/// every mutation is a single statement against one row.
///
/// **Send + Sync + async_trait** let `Arc<dyn ArticleStore>` live in the shared
/// axum state.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// One page of active articles (by ascending id) and the active total.
    async fn list_paginated(&self, page: Page) -> AppResult<(Vec<Article>, i64)>;

    /// Like `list_paginated`, restricted to an exact category. An empty
    /// category is a validation error, never an unfiltered list.
    async fn list_by_category(&self, category: &str, page: Page)
    -> AppResult<(Vec<Article>, i64)>;

    /// Like `list_paginated`, restricted to an exact tag.
    async fn list_by_tag(&self, tag: &str, page: Page) -> AppResult<(Vec<Article>, i64)>;

    /// The active article with this id, or `None`.
    async fn get_by_id(&self, id: i64) -> AppResult<Option<Article>>;

    async fn categories_summary(&self) -> AppResult<Vec<CategoryCount>>;
    async fn tags_summary(&self) -> AppResult<Vec<TagCount>>;

    /// Every active article, newest first.
    async fn archive(&self) -> AppResult<Vec<Article>>;

    async fn create(&self, article: NewArticle) -> AppResult<Article>;

    /// Overwrites the supplied fields. `NotFound` if no active row has this id.
    async fn update(&self, id: i64, patch: ArticlePatch) -> AppResult<()>;

    /// Marks the row deleted. `NotFound` if no active row has this id.
    async fn soft_delete(&self, id: i64) -> AppResult<()>;
}

/// UserStore
///
/// Persistence contract for accounts. Usernames are unique among active rows;
/// the engine enforces it, the store only reports it.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts the account unless an active user already has this username.
    /// Returns `None` when the username was taken.
    async fn create_if_absent(&self, username: &str, password_digest: &str)
    -> AppResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;
}

pub type ArticleStoreState = Arc<dyn ArticleStore>;
pub type UserStoreState = Arc<dyn UserStore>;

pub(crate) fn require_filter(field: &str, value: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(())
}
