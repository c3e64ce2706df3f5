use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use ts_rs::TS;
use url::Url;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Naive timestamps supplied by clients are wall-clock times in UTC+8.
pub const BLOG_UTC_OFFSET_HOURS: i64 = 8;

pub const TITLE_MAX_CHARS: usize = 23;
pub const USERNAME_MIN_CHARS: usize = 5;
pub const USERNAME_MAX_CHARS: usize = 10;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

// --- Lifecycle ---

/// Lifecycle
///
/// Soft-delete state of a row. The database stores this as a nullable
/// `deleted_at` column; in Rust it is an explicit state so that a deletion
/// timestamp can never be mistaken for an ordinary date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted { at: DateTime<Utc> },
}

impl Lifecycle {
    pub fn from_marker(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            Some(at) => Lifecycle::Deleted { at },
            None => Lifecycle::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }
}

// --- Accounts ---

/// User
///
/// Canonical account row from the `users` table. The digest never leaves the
/// server; responses use `PublicUser`.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lifecycle: Lifecycle,
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_digest: row.try_get("password_digest")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            lifecycle: Lifecycle::from_marker(row.try_get("deleted_at")?),
        })
    }
}

/// PublicUser
///
/// The only projection of a `User` that is ever serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            created_at: user.created_at,
        }
    }
}

/// Credentials
///
/// Body of `/register` and `/login`. Both fields are optional at the type level
/// so that a missing field becomes a validation envelope, not a parser error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// AuthPayload
///
/// Successful registration/login result: a fresh token plus the public profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthPayload {
    pub token: String,
    pub user_info: PublicUser,
}

// --- Articles ---

/// Article
///
/// A row of the `articles` table. `desc` lives in the `description` column
/// because `desc` is an SQL keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub desc: Option<String>,
    pub banner: Option<String>,
    #[ts(type = "string")]
    pub time: DateTime<Utc>,
    pub category: String,
    pub tag: String,
    pub detail: String,
    pub view: Option<i64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    // Reads only ever return active rows.
    #[serde(skip)]
    #[ts(skip)]
    pub lifecycle: Lifecycle,
}

impl<'r> FromRow<'r, PgRow> for Article {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            desc: row.try_get("description")?,
            banner: row.try_get("banner")?,
            time: row.try_get("time")?,
            category: row.try_get("category")?,
            tag: row.try_get("tag")?,
            detail: row.try_get("detail")?,
            view: row.try_get("view")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            lifecycle: Lifecycle::from_marker(row.try_get("deleted_at")?),
        })
    }
}

/// ArticleRequest
///
/// Raw article fields as posted by the admin client. Everything is optional
/// here; `into_new_article` and `into_patch` decide what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<i64>,
}

/// EditArticleRequest
///
/// Body of `/private/edit`: the target id next to the fields to overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EditArticleRequest {
    pub id: Option<i64>,
    #[serde(flatten)]
    pub fields: ArticleRequest,
}

/// NewArticle
///
/// Validated input for `ArticleStore::create`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub desc: Option<String>,
    pub banner: Option<String>,
    /// `None` means "use the creation timestamp".
    pub time: Option<DateTime<Utc>>,
    pub category: String,
    pub tag: String,
    pub detail: String,
    pub view: Option<i64>,
}

/// ArticlePatch
///
/// Validated field-by-field overwrite for `ArticleStore::update`. `None`
/// leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub banner: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub detail: Option<String>,
    pub view: Option<i64>,
}

impl ArticleRequest {
    pub fn into_new_article(self) -> AppResult<NewArticle> {
        let title = validate_title(self.title.as_deref().unwrap_or_default())?;
        let category = required_label("category", self.category)?;
        let tag = required_label("tag", self.tag)?;
        Ok(NewArticle {
            title,
            desc: self.desc,
            banner: validate_banner(self.banner)?,
            time: parse_optional_time(self.time)?,
            category,
            tag,
            detail: self.detail.unwrap_or_default(),
            view: validate_view(self.view)?,
        })
    }

    pub fn into_patch(self) -> AppResult<ArticlePatch> {
        let title = self.title.as_deref().map(validate_title).transpose()?;
        let category = self
            .category
            .map(|value| required_label("category", Some(value)))
            .transpose()?;
        let tag = self
            .tag
            .map(|value| required_label("tag", Some(value)))
            .transpose()?;
        Ok(ArticlePatch {
            title,
            desc: self.desc,
            banner: validate_banner(self.banner)?,
            time: parse_optional_time(self.time)?,
            category,
            tag,
            detail: self.detail,
            view: validate_view(self.view)?,
        })
    }
}

fn validate_title(title: &str) -> AppResult<String> {
    let len = title.chars().count();
    if len == 0 || len > TITLE_MAX_CHARS {
        return Err(AppError::validation(format!(
            "title must be 1-{TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

fn required_label(field: &str, value: Option<String>) -> AppResult<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::validation(format!("{field} is required"))),
    }
}

fn validate_banner(banner: Option<String>) -> AppResult<Option<String>> {
    match banner.filter(|b| !b.is_empty()) {
        None => Ok(None),
        Some(raw) => match Url::parse(&raw) {
            Ok(url) if url.has_host() => Ok(Some(raw)),
            _ => Err(AppError::validation("banner must be a valid URL")),
        },
    }
}

fn validate_view(view: Option<i64>) -> AppResult<Option<i64>> {
    match view {
        Some(v) if v < 0 => Err(AppError::validation("view must not be negative")),
        other => Ok(other),
    }
}

fn parse_optional_time(time: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    time.filter(|t| !t.is_empty())
        .map(|t| parse_article_time(&t))
        .transpose()
}

/// parse_article_time
///
/// Accepts an RFC 3339 timestamp, or a naive `YYYY-MM-DD HH:MM:SS` /
/// `YYYY-MM-DD` wall-clock time in the blog's UTC+8 zone.
pub fn parse_article_time(raw: &str) -> AppResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| AppError::validation("time must be a valid date"))?;
    Ok((naive - TimeDelta::hours(BLOG_UTC_OFFSET_HOURS)).and_utc())
}

/// validate_username
///
/// Usernames are 5–10 characters long.
pub fn validate_username(username: &str) -> AppResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(AppError::validation(format!(
            "username must be {USERNAME_MIN_CHARS}-{USERNAME_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

// --- Pagination & listing ---

/// PageRequest
///
/// Optional paging parameters. Missing or zero values fall back to page 1 and
/// ten rows per page.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Page
///
/// A normalized page window; both numbers are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Rows to skip. Saturates instead of overflowing for absurd page numbers.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl PageRequest {
    pub fn normalize(self) -> AppResult<Page> {
        Ok(Page {
            page: positive_or("page", self.page, DEFAULT_PAGE)?,
            page_size: positive_or("pageSize", self.page_size, DEFAULT_PAGE_SIZE)?,
        })
    }
}

fn positive_or(field: &str, value: Option<i64>, default: i64) -> AppResult<i64> {
    match value {
        None | Some(0) => Ok(default),
        Some(v) if v < 0 => Err(AppError::validation(format!("{field} must be positive"))),
        Some(v) => Ok(v),
    }
}

/// CategoryRequest
///
/// Body of `/public/category`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CategoryRequest {
    pub category: Option<String>,
    #[serde(flatten)]
    pub paging: PageRequest,
}

/// TagRequest
///
/// Body of `/public/tag`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TagRequest {
    pub tag: Option<String>,
    #[serde(flatten)]
    pub paging: PageRequest,
}

/// ArticlePage
///
/// One page of articles plus the total number of active articles matching the
/// query, so the client can compute the page count.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ArticlePage {
    pub posts: Vec<Article>,
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct CategoryCount {
    pub category: String,
    pub num: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct TagCount {
    pub tag: String,
    pub num: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CategoriesSummary {
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TagsSummary {
    pub tags: Vec<TagCount>,
}
