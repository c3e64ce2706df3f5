use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{ArticleStore, UserStore, require_filter};
use crate::{
    error::{AppError, AppResult},
    models::{Article, ArticlePatch, CategoryCount, Lifecycle, NewArticle, Page, TagCount, User},
};

#[derive(Default)]
struct Tables {
    articles: Vec<Article>,
    users: Vec<User>,
    next_article_id: i64,
    next_user_id: i64,
}

/// InMemoryRepository
///
/// A process-local implementation of both stores with the same observable
/// semantics as `PostgresRepository`: soft-deleted rows are retained but
/// invisible, usernames are unique among active users, and every operation is
/// atomic under one lock. Used by the handler and API test suites.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows held, soft-deleted ones included.
    pub async fn stored_article_count(&self) -> usize {
        self.tables.read().await.articles.len()
    }

    async fn page_where<F>(&self, page: Page, keep: F) -> (Vec<Article>, i64)
    where
        F: Fn(&Article) -> bool,
    {
        let tables = self.tables.read().await;
        let matching: Vec<&Article> = tables
            .articles
            .iter()
            .filter(|a| a.lifecycle.is_active() && keep(a))
            .collect();
        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.page_size).unwrap_or(usize::MAX);
        let posts = matching.into_iter().skip(skip).take(take).cloned().collect();
        (posts, total)
    }

    async fn count_by<F>(&self, key: F) -> Vec<(String, i64)>
    where
        F: Fn(&Article) -> &str,
    {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for article in tables.articles.iter().filter(|a| a.lifecycle.is_active()) {
            *counts.entry(key(article).to_string()).or_default() += 1;
        }
        counts.into_iter().collect()
    }
}

#[async_trait]
impl ArticleStore for InMemoryRepository {
    async fn list_paginated(&self, page: Page) -> AppResult<(Vec<Article>, i64)> {
        Ok(self.page_where(page, |_| true).await)
    }

    async fn list_by_category(
        &self,
        category: &str,
        page: Page,
    ) -> AppResult<(Vec<Article>, i64)> {
        require_filter("category", category)?;
        Ok(self.page_where(page, |a| a.category == category).await)
    }

    async fn list_by_tag(&self, tag: &str, page: Page) -> AppResult<(Vec<Article>, i64)> {
        require_filter("tag", tag)?;
        Ok(self.page_where(page, |a| a.tag == tag).await)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Article>> {
        let tables = self.tables.read().await;
        Ok(tables
            .articles
            .iter()
            .find(|a| a.id == id && a.lifecycle.is_active())
            .cloned())
    }

    async fn categories_summary(&self) -> AppResult<Vec<CategoryCount>> {
        let counts = self.count_by(|a| a.category.as_str()).await;
        Ok(counts
            .into_iter()
            .map(|(category, num)| CategoryCount { category, num })
            .collect())
    }

    async fn tags_summary(&self) -> AppResult<Vec<TagCount>> {
        let counts = self.count_by(|a| a.tag.as_str()).await;
        Ok(counts
            .into_iter()
            .map(|(tag, num)| TagCount { tag, num })
            .collect())
    }

    async fn archive(&self) -> AppResult<Vec<Article>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Article> = tables
            .articles
            .iter()
            .filter(|a| a.lifecycle.is_active())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn create(&self, article: NewArticle) -> AppResult<Article> {
        let mut tables = self.tables.write().await;
        tables.next_article_id += 1;
        let now = Utc::now();
        let created = Article {
            id: tables.next_article_id,
            title: article.title,
            desc: article.desc,
            banner: article.banner,
            time: article.time.unwrap_or(now),
            category: article.category,
            tag: article.tag,
            detail: article.detail,
            view: article.view,
            created_at: now,
            updated_at: now,
            lifecycle: Lifecycle::Active,
        };
        tables.articles.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, patch: ArticlePatch) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let article = tables
            .articles
            .iter_mut()
            .find(|a| a.id == id && a.lifecycle.is_active())
            .ok_or_else(AppError::article_not_found)?;

        if let Some(title) = patch.title {
            article.title = title;
        }
        if let Some(desc) = patch.desc {
            article.desc = Some(desc);
        }
        if let Some(banner) = patch.banner {
            article.banner = Some(banner);
        }
        if let Some(time) = patch.time {
            article.time = time;
        }
        if let Some(category) = patch.category {
            article.category = category;
        }
        if let Some(tag) = patch.tag {
            article.tag = tag;
        }
        if let Some(detail) = patch.detail {
            article.detail = detail;
        }
        if let Some(view) = patch.view {
            article.view = Some(view);
        }
        article.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let article = tables
            .articles
            .iter_mut()
            .find(|a| a.id == id && a.lifecycle.is_active())
            .ok_or_else(AppError::article_not_found)?;
        article.lifecycle = Lifecycle::Deleted { at: Utc::now() };
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryRepository {
    async fn create_if_absent(
        &self,
        username: &str,
        password_digest: &str,
    ) -> AppResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.username == username && u.lifecycle.is_active())
        {
            return Ok(None);
        }
        tables.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: tables.next_user_id,
            username: username.to_string(),
            password_digest: password_digest.to_string(),
            created_at: now,
            updated_at: now,
            lifecycle: Lifecycle::Active,
        };
        tables.users.push(user.clone());
        Ok(Some(user))
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.username == username && u.lifecycle.is_active())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_article(title: &str, category: &str, tag: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            desc: None,
            banner: None,
            time: None,
            category: category.to_string(),
            tag: tag.to_string(),
            detail: "d".to_string(),
            view: None,
        }
    }

    async fn seeded(n: usize) -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        for i in 0..n {
            repo.create(new_article(&format!("post {i}"), "c", "t"))
                .await
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn pages_are_bounded_and_count_is_total() {
        let repo = seeded(25).await;
        for (page, expected) in [(1, 10), (2, 10), (3, 5), (4, 0)] {
            let (rows, total) = repo
                .list_paginated(Page { page, page_size: 10 })
                .await
                .unwrap();
            assert_eq!(rows.len(), expected);
            assert_eq!(total, 25);
        }
    }

    #[tokio::test]
    async fn offset_follows_requested_page_size() {
        let repo = seeded(7).await;
        let (rows, _) = repo
            .list_paginated(Page { page: 2, page_size: 3 })
            .await
            .unwrap();
        let titles: Vec<_> = rows.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["post 3", "post 4", "post 5"]);
    }

    #[tokio::test]
    async fn soft_delete_hides_but_retains() {
        let repo = seeded(2).await;
        repo.soft_delete(1).await.unwrap();

        assert_eq!(repo.get_by_id(1).await.unwrap(), None);
        let (rows, total) = repo.list_paginated(Page::default()).await.unwrap();
        assert_eq!((rows.len(), total), (1, 1));
        assert_eq!(repo.stored_article_count().await, 2);

        assert_eq!(repo.soft_delete(1).await, Err(AppError::article_not_found()));
        assert_eq!(
            repo.update(1, ArticlePatch::default()).await,
            Err(AppError::article_not_found())
        );
    }

    #[tokio::test]
    async fn summaries_group_active_rows() {
        let repo = InMemoryRepository::new();
        for category in ["a", "a", "b"] {
            repo.create(new_article("x", category, "t")).await.unwrap();
        }
        let summary = repo.categories_summary().await.unwrap();
        assert_eq!(
            summary,
            vec![
                CategoryCount { category: "a".into(), num: 2 },
                CategoryCount { category: "b".into(), num: 1 },
            ]
        );

        repo.soft_delete(3).await.unwrap();
        let tags = repo.tags_summary().await.unwrap();
        assert_eq!(tags, vec![TagCount { tag: "t".into(), num: 2 }]);
    }

    #[tokio::test]
    async fn empty_filter_is_rejected() {
        let repo = seeded(1).await;
        assert!(matches!(
            repo.list_by_category("", Page::default()).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            repo.list_by_tag("", Page::default()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn archive_is_newest_first() {
        let repo = seeded(3).await;
        let ids: Vec<i64> = repo.archive().await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, [3, 2, 1]);
    }

    #[tokio::test]
    async fn update_overwrites_only_supplied_fields() {
        let repo = seeded(1).await;
        repo.update(
            1,
            ArticlePatch {
                title: Some("renamed".into()),
                ..ArticlePatch::default()
            },
        )
        .await
        .unwrap();
        let article = repo.get_by_id(1).await.unwrap().unwrap();
        assert_eq!(article.title, "renamed");
        assert_eq!(article.category, "c");
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let repo = InMemoryRepository::new();
        assert!(repo.create_if_absent("alice1", "x").await.unwrap().is_some());
        assert!(repo.create_if_absent("alice1", "y").await.unwrap().is_none());
        let found = repo.find_by_username("alice1").await.unwrap().unwrap();
        assert_eq!(found.password_digest, "x");
    }
}
