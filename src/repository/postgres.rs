use async_trait::async_trait;
use sqlx::{
    Executor, PgPool, Postgres,
    migrate::MigrateError,
    postgres::PgPoolOptions,
    query_builder::QueryBuilder,
};
use std::time::Duration;

use super::{ArticleStore, UserStore, require_filter};
use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{Article, ArticlePatch, CategoryCount, NewArticle, Page, TagCount, User},
};

/// Temporal columns are read and written in UTC+8.
const SESSION_TIME_ZONE: &str = "SET TIME ZONE INTERVAL '+08:00' HOUR TO MINUTE";

const ARTICLE_COLUMNS: &str = r#"id, title, description, banner, "time", category, tag, detail, "view", created_at, updated_at, deleted_at"#;

const USER_COLUMNS: &str = "id, username, password_digest, created_at, updated_at, deleted_at";

/// connect
///
/// Opens the process-wide connection pool. Idle connections are evicted after
/// `db_idle_timeout_secs`; every new connection pins its session time zone.
pub async fn connect(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(0)
        .idle_timeout(Duration::from_secs(config.db_idle_timeout_secs))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute(SESSION_TIME_ZONE).await?;
                Ok(())
            })
        })
        .connect(&config.db_url)
        .await
}

/// Applies the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// PostgresRepository
///
/// Implements both stores over one shared `PgPool`. Each method checks a
/// connection out of the pool for a single statement; sqlx returns it on drop,
/// success or not.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

#[derive(Clone, Copy)]
enum ArticleFilter<'a> {
    Category(&'a str),
    Tag(&'a str),
}

fn push_active_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: Option<ArticleFilter<'_>>) {
    builder.push(" WHERE deleted_at IS NULL");
    match filter {
        Some(ArticleFilter::Category(category)) => {
            builder.push(" AND category = ").push_bind(category.to_string());
        }
        Some(ArticleFilter::Tag(tag)) => {
            builder.push(" AND tag = ").push_bind(tag.to_string());
        }
        None => {}
    }
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Drains and closes the pool. Called once during shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Shared body of the three list endpoints. The offset always uses the
    /// requested page size.
    async fn page_of(
        &self,
        filter: Option<ArticleFilter<'_>>,
        page: Page,
    ) -> AppResult<(Vec<Article>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM articles");
        push_active_filter(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut rows: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ARTICLE_COLUMNS} FROM articles"));
        push_active_filter(&mut rows, filter);
        rows.push(" ORDER BY id ASC LIMIT ")
            .push_bind(page.page_size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let posts = rows.build_query_as::<Article>().fetch_all(&self.pool).await?;

        Ok((posts, total))
    }
}

#[async_trait]
impl ArticleStore for PostgresRepository {
    async fn list_paginated(&self, page: Page) -> AppResult<(Vec<Article>, i64)> {
        self.page_of(None, page).await
    }

    async fn list_by_category(
        &self,
        category: &str,
        page: Page,
    ) -> AppResult<(Vec<Article>, i64)> {
        require_filter("category", category)?;
        self.page_of(Some(ArticleFilter::Category(category)), page).await
    }

    async fn list_by_tag(&self, tag: &str, page: Page) -> AppResult<(Vec<Article>, i64)> {
        require_filter("tag", tag)?;
        self.page_of(Some(ArticleFilter::Tag(tag)), page).await
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1 AND deleted_at IS NULL");
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    async fn categories_summary(&self) -> AppResult<Vec<CategoryCount>> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            r#"
            SELECT category, COUNT(*) AS num
            FROM articles
            WHERE deleted_at IS NULL
            GROUP BY category
            ORDER BY category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn tags_summary(&self) -> AppResult<Vec<TagCount>> {
        let rows = sqlx::query_as::<_, TagCount>(
            r#"
            SELECT tag, COUNT(*) AS num
            FROM articles
            WHERE deleted_at IS NULL
            GROUP BY tag
            ORDER BY tag
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn archive(&self) -> AppResult<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE deleted_at IS NULL ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, Article>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Absent `time` becomes the insert timestamp, absent `detail` an empty body.
    async fn create(&self, article: NewArticle) -> AppResult<Article> {
        let sql = format!(
            r#"
            INSERT INTO articles (title, description, banner, "time", category, tag, detail, "view")
            VALUES ($1, $2, $3, COALESCE($4, NOW()), $5, $6, $7, $8)
            RETURNING {ARTICLE_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Article>(&sql)
            .bind(article.title)
            .bind(article.desc)
            .bind(article.banner)
            .bind(article.time)
            .bind(article.category)
            .bind(article.tag)
            .bind(article.detail)
            .bind(article.view)
            .fetch_one(&self.pool)
            .await?;
        tracing::info!(article_id = created.id, "article created");
        Ok(created)
    }

    /// Uses `COALESCE` so that only the supplied fields overwrite their columns.
    async fn update(&self, id: i64, patch: ArticlePatch) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                banner = COALESCE($4, banner),
                "time" = COALESCE($5, "time"),
                category = COALESCE($6, category),
                tag = COALESCE($7, tag),
                detail = COALESCE($8, detail),
                "view" = COALESCE($9, "view"),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.desc)
        .bind(patch.banner)
        .bind(patch.time)
        .bind(patch.category)
        .bind(patch.tag)
        .bind(patch.detail)
        .bind(patch.view)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::article_not_found());
        }
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE articles SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::article_not_found());
        }
        tracing::info!(article_id = id, "article soft-deleted");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresRepository {
    /// `ON CONFLICT … DO NOTHING` makes find-or-create a single statement; a
    /// concurrent insert that still trips the index surfaces as SQLSTATE 23505
    /// and converts to `DuplicateUser`.
    async fn create_if_absent(
        &self,
        username: &str,
        password_digest: &str,
    ) -> AppResult<Option<User>> {
        let sql = format!(
            r#"
            INSERT INTO users (username, password_digest)
            VALUES ($1, $2)
            ON CONFLICT (username) WHERE deleted_at IS NULL DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(password_digest)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
