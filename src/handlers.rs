use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::Response,
};

use crate::{
    AppState,
    envelope::render,
    error::{AppError, AppResult},
    models::{
        Article, ArticlePage, ArticleRequest, AuthPayload, CategoriesSummary, CategoryRequest,
        Credentials, EditArticleRequest, Page, PageRequest, TagRequest, TagsSummary,
    },
};

// --- Envelope messages ---

const QUERY_OK: &str = "query succeeded";
const FETCH_OK: &str = "fetched successfully";
const REGISTER_OK: &str = "registered successfully";
const LOGIN_OK: &str = "logged in successfully";
const CREATE_OK: &str = "created successfully";
const EDIT_OK: &str = "updated successfully";
const DELETE_OK: &str = "deleted successfully";

// --- Input helpers ---

/// read_body
///
/// Turns a JSON extraction outcome into a body or a validation error. A request
/// without a JSON content type is treated as an empty body, so list endpoints
/// can be called bare and fall back to their defaults.
fn read_body<T: Default>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(AppError::validation(rejection.body_text())),
    }
}

fn parse_article_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::validation("article id must be an integer"))
}

fn page_response((posts, count): (Vec<Article>, i64), page: Page) -> Option<ArticlePage> {
    Some(ArticlePage {
        posts,
        count,
        page: page.page,
        page_size: page.page_size,
    })
}

/// missing_article_id
///
/// Mounted on the id-less variants of the id routes so that a request without
/// an id gets a validation envelope rather than a bare 404.
pub async fn missing_article_id() -> Response {
    render::<()>(Err(AppError::validation("article id is required")), FETCH_OK)
}

// --- Public handlers ---

/// list_posts
///
/// [Public Route] One page of active articles. `page`/`pageSize` default to
/// 1/10 when missing or zero.
#[utoipa::path(
    post,
    path = "/public/posts",
    request_body = PageRequest,
    responses((status = 200, description = "Envelope carrying an ArticlePage", body = ArticlePage))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    payload: Result<Json<PageRequest>, JsonRejection>,
) -> Response {
    render(list_posts_inner(&state, payload).await, QUERY_OK)
}

async fn list_posts_inner(
    state: &AppState,
    payload: Result<Json<PageRequest>, JsonRejection>,
) -> AppResult<Option<ArticlePage>> {
    let page = read_body(payload)?.normalize()?;
    let rows = state.articles.list_paginated(page).await?;
    Ok(page_response(rows, page))
}

/// list_by_category
///
/// [Public Route] Same paging contract as `list_posts`, filtered by an exact
/// category. A missing or empty category is rejected.
#[utoipa::path(
    post,
    path = "/public/category",
    request_body = CategoryRequest,
    responses((status = 200, description = "Envelope carrying an ArticlePage", body = ArticlePage))
)]
pub async fn list_by_category(
    State(state): State<AppState>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Response {
    render(list_by_category_inner(&state, payload).await, FETCH_OK)
}

async fn list_by_category_inner(
    state: &AppState,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> AppResult<Option<ArticlePage>> {
    let body = read_body(payload)?;
    let page = body.paging.normalize()?;
    let category = body.category.unwrap_or_default();
    let rows = state.articles.list_by_category(&category, page).await?;
    Ok(page_response(rows, page))
}

/// list_by_tag
///
/// [Public Route] Same paging contract as `list_posts`, filtered by an exact tag.
#[utoipa::path(
    post,
    path = "/public/tag",
    request_body = TagRequest,
    responses((status = 200, description = "Envelope carrying an ArticlePage", body = ArticlePage))
)]
pub async fn list_by_tag(
    State(state): State<AppState>,
    payload: Result<Json<TagRequest>, JsonRejection>,
) -> Response {
    render(list_by_tag_inner(&state, payload).await, FETCH_OK)
}

async fn list_by_tag_inner(
    state: &AppState,
    payload: Result<Json<TagRequest>, JsonRejection>,
) -> AppResult<Option<ArticlePage>> {
    let body = read_body(payload)?;
    let page = body.paging.normalize()?;
    let tag = body.tag.unwrap_or_default();
    let rows = state.articles.list_by_tag(&tag, page).await?;
    Ok(page_response(rows, page))
}

/// get_categories
///
/// [Public Route] Number of active articles per category.
#[utoipa::path(
    get,
    path = "/public/categories",
    responses((status = 200, description = "Envelope carrying category counts", body = CategoriesSummary))
)]
pub async fn get_categories(State(state): State<AppState>) -> Response {
    let result = state
        .articles
        .categories_summary()
        .await
        .map(|categories| Some(CategoriesSummary { categories }));
    render(result, QUERY_OK)
}

/// get_tags
///
/// [Public Route] Number of active articles per tag.
#[utoipa::path(
    get,
    path = "/public/tags",
    responses((status = 200, description = "Envelope carrying tag counts", body = TagsSummary))
)]
pub async fn get_tags(State(state): State<AppState>) -> Response {
    let result = state
        .articles
        .tags_summary()
        .await
        .map(|tags| Some(TagsSummary { tags }));
    render(result, QUERY_OK)
}

/// get_content
///
/// [Public Route] A single active article. A soft-deleted or unknown id renders
/// the "article not found" failure envelope (`code: 0`). Older clients that
/// expect `{code: 1, data: null}` for a missing id must branch on `code`.
#[utoipa::path(
    get,
    path = "/public/content/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses((status = 200, description = "Envelope carrying the article", body = Article))
)]
pub async fn get_content(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    render(get_content_inner(&state, &id).await, FETCH_OK)
}

async fn get_content_inner(state: &AppState, id: &str) -> AppResult<Option<Article>> {
    let id = parse_article_id(id)?;
    match state.articles.get_by_id(id).await? {
        Some(article) => Ok(Some(article)),
        None => Err(AppError::article_not_found()),
    }
}

/// get_archive
///
/// [Public Route] Every active article, newest first.
#[utoipa::path(
    get,
    path = "/public/archive",
    responses((status = 200, description = "Envelope carrying the archive feed", body = [Article]))
)]
pub async fn get_archive(State(state): State<AppState>) -> Response {
    render(state.articles.archive().await.map(Some), FETCH_OK)
}

/// register
///
/// [Public Route] Creates an account and returns a token with the public profile.
#[utoipa::path(
    post,
    path = "/public/register",
    request_body = Credentials,
    responses((status = 200, description = "Envelope carrying token and userInfo", body = AuthPayload))
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let result = match read_body(payload) {
        Ok(credentials) => state.accounts.register(credentials).await.map(Some),
        Err(err) => Err(err),
    };
    render(result, REGISTER_OK)
}

/// login
///
/// [Public Route] Verifies credentials and returns a fresh token.
#[utoipa::path(
    post,
    path = "/public/login",
    request_body = Credentials,
    responses((status = 200, description = "Envelope carrying token and userInfo", body = AuthPayload))
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let result = match read_body(payload) {
        Ok(credentials) => state.accounts.login(credentials).await.map(Some),
        Err(err) => Err(err),
    };
    render(result, LOGIN_OK)
}

// --- Private handlers (behind the auth gate) ---

/// create_post
///
/// [Private Route] Validates and inserts a new article. Renders no data.
#[utoipa::path(
    post,
    path = "/private/post",
    request_body = ArticleRequest,
    responses((status = 200, description = "Envelope"), (status = 401, description = "Missing or invalid token"))
)]
pub async fn create_post(
    State(state): State<AppState>,
    payload: Result<Json<ArticleRequest>, JsonRejection>,
) -> Response {
    render::<()>(create_post_inner(&state, payload).await, CREATE_OK)
}

async fn create_post_inner(
    state: &AppState,
    payload: Result<Json<ArticleRequest>, JsonRejection>,
) -> AppResult<Option<()>> {
    let article = read_body(payload)?.into_new_article()?;
    state.articles.create(article).await?;
    Ok(None)
}

/// edit_post
///
/// [Private Route] Overwrites the supplied fields of the article named by `id`.
/// Unknown or soft-deleted ids render "article not found".
#[utoipa::path(
    post,
    path = "/private/edit",
    request_body = EditArticleRequest,
    responses((status = 200, description = "Envelope"), (status = 401, description = "Missing or invalid token"))
)]
pub async fn edit_post(
    State(state): State<AppState>,
    payload: Result<Json<EditArticleRequest>, JsonRejection>,
) -> Response {
    render::<()>(edit_post_inner(&state, payload).await, EDIT_OK)
}

async fn edit_post_inner(
    state: &AppState,
    payload: Result<Json<EditArticleRequest>, JsonRejection>,
) -> AppResult<Option<()>> {
    let body = read_body(payload)?;
    let id = body
        .id
        .ok_or_else(|| AppError::validation("article id is required"))?;
    let patch = body.fields.into_patch()?;
    state.articles.update(id, patch).await?;
    Ok(None)
}

/// delete_post
///
/// [Private Route] Soft-deletes an article. The row stays in storage but
/// disappears from every public read.
#[utoipa::path(
    delete,
    path = "/private/deletePost/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses((status = 200, description = "Envelope"), (status = 401, description = "Missing or invalid token"))
)]
pub async fn delete_post(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = match parse_article_id(&id) {
        Ok(id) => state.articles.soft_delete(id).await.map(|()| None),
        Err(err) => Err(err),
    };
    render::<()>(result, DELETE_OK)
}
