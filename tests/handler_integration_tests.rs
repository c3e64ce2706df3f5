use axum::{
    Json,
    body::to_bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::test;
use uncode_blog::{
    AppState, InMemoryRepository,
    config::AppConfig,
    handlers,
    models::{ArticleRequest, CategoryRequest, Credentials, EditArticleRequest, PageRequest},
};

// --- Helpers ---

fn state() -> (AppState, Arc<InMemoryRepository>) {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState::new(repo.clone(), repo.clone(), AppConfig::default());
    (state, repo)
}

/// Every handler answers 200; the outcome lives in the envelope.
async fn envelope(response: Response) -> Value {
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

fn article(title: &str, category: &str, tag: &str) -> ArticleRequest {
    ArticleRequest {
        title: Some(title.to_string()),
        category: Some(category.to_string()),
        tag: Some(tag.to_string()),
        detail: Some("body".to_string()),
        ..Default::default()
    }
}

async fn seed(state: &AppState, request: ArticleRequest) {
    let body = envelope(handlers::create_post(State(state.clone()), Ok(Json(request))).await).await;
    assert_eq!(body["code"], 1, "seeding failed: {body}");
}

// --- Tests ---

#[test]
async fn test_create_then_list_posts() {
    let (state, _) = state();
    seed(&state, article("First", "rust", "async")).await;
    seed(&state, article("Second", "rust", "web")).await;

    let body = envelope(
        handlers::list_posts(State(state.clone()), Ok(Json(PageRequest::default()))).await,
    )
    .await;

    assert_eq!(body["code"], 1);
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["pageSize"], 10);
    assert_eq!(body["data"]["posts"][0]["title"], "First");
    assert_eq!(body["data"]["posts"][1]["title"], "Second");
}

#[test]
async fn test_create_post_without_data_field() {
    let (state, _) = state();
    let body =
        envelope(handlers::create_post(State(state), Ok(Json(article("T", "c", "t")))).await).await;

    assert_eq!(body["code"], 1);
    assert!(body.get("data").is_none());
}

#[test]
async fn test_title_length_bounds() {
    let (state, repo) = state();

    for title in ["", "abcdefghijklmnopqrstuvwx"] {
        let body = envelope(
            handlers::create_post(State(state.clone()), Ok(Json(article(title, "c", "t")))).await,
        )
        .await;
        assert_eq!(body["code"], 0, "title {title:?} should be rejected");
    }
    assert_eq!(repo.stored_article_count().await, 0);

    for title in ["a", "abcdefghijklmnopqrstuvw"] {
        seed(&state, article(title, "c", "t")).await;
    }
    assert_eq!(repo.stored_article_count().await, 2);
}

#[test]
async fn test_invalid_banner_is_rejected() {
    let (state, repo) = state();
    let mut request = article("T", "c", "t");
    request.banner = Some("not a url".to_string());

    let body = envelope(handlers::create_post(State(state), Ok(Json(request))).await).await;

    assert_eq!(body["code"], 0);
    assert_eq!(body["msg"], "banner must be a valid URL");
    assert_eq!(repo.stored_article_count().await, 0);
}

#[test]
async fn test_get_content_found_and_missing() {
    let (state, _) = state();
    seed(&state, article("Hello", "c", "t")).await;

    let found =
        envelope(handlers::get_content(State(state.clone()), Path("1".to_string())).await).await;
    assert_eq!(found["code"], 1);
    assert_eq!(found["data"]["title"], "Hello");
    assert_eq!(found["data"]["detail"], "body");

    let missing =
        envelope(handlers::get_content(State(state.clone()), Path("99".to_string())).await).await;
    assert_eq!(missing["code"], 0);
    assert_eq!(missing["msg"], "article not found");

    let garbage =
        envelope(handlers::get_content(State(state), Path("abc".to_string())).await).await;
    assert_eq!(garbage["code"], 0);
}

#[test]
async fn test_delete_hides_article_but_keeps_row() {
    let (state, repo) = state();
    seed(&state, article("Doomed", "c", "t")).await;

    let deleted =
        envelope(handlers::delete_post(State(state.clone()), Path("1".to_string())).await).await;
    assert_eq!(deleted["code"], 1);

    let lookup =
        envelope(handlers::get_content(State(state.clone()), Path("1".to_string())).await).await;
    assert_eq!(lookup["code"], 0);

    let again =
        envelope(handlers::delete_post(State(state.clone()), Path("1".to_string())).await).await;
    assert_eq!(again["code"], 0);

    let list = envelope(
        handlers::list_posts(State(state), Ok(Json(PageRequest::default()))).await,
    )
    .await;
    assert_eq!(list["data"]["count"], 0);
    assert_eq!(repo.stored_article_count().await, 1);
}

#[test]
async fn test_edit_overwrites_only_supplied_fields() {
    let (state, _) = state();
    seed(&state, article("Before", "c", "t")).await;

    let edit = EditArticleRequest {
        id: Some(1),
        fields: ArticleRequest {
            title: Some("After".to_string()),
            ..Default::default()
        },
    };
    let body = envelope(handlers::edit_post(State(state.clone()), Ok(Json(edit))).await).await;
    assert_eq!(body["code"], 1);

    let content =
        envelope(handlers::get_content(State(state), Path("1".to_string())).await).await;
    assert_eq!(content["data"]["title"], "After");
    assert_eq!(content["data"]["category"], "c");
}

#[test]
async fn test_edit_without_id_or_unknown_id() {
    let (state, _) = state();

    let no_id = envelope(
        handlers::edit_post(State(state.clone()), Ok(Json(EditArticleRequest::default()))).await,
    )
    .await;
    assert_eq!(no_id["code"], 0);
    assert_eq!(no_id["msg"], "article id is required");

    let unknown = EditArticleRequest {
        id: Some(42),
        fields: ArticleRequest::default(),
    };
    let body = envelope(handlers::edit_post(State(state), Ok(Json(unknown))).await).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["msg"], "article not found");
}

#[test]
async fn test_category_filter_and_summary() {
    let (state, _) = state();
    seed(&state, article("One", "a", "x")).await;
    seed(&state, article("Two", "a", "y")).await;
    seed(&state, article("Three", "b", "x")).await;

    let request = CategoryRequest {
        category: Some("a".to_string()),
        paging: PageRequest::default(),
    };
    let filtered =
        envelope(handlers::list_by_category(State(state.clone()), Ok(Json(request))).await).await;
    assert_eq!(filtered["data"]["count"], 2);

    let summary = envelope(handlers::get_categories(State(state.clone())).await).await;
    assert_eq!(
        summary["data"]["categories"],
        json!([{"category": "a", "num": 2}, {"category": "b", "num": 1}])
    );

    let tags = envelope(handlers::get_tags(State(state)).await).await;
    assert_eq!(
        tags["data"]["tags"],
        json!([{"tag": "x", "num": 2}, {"tag": "y", "num": 1}])
    );
}

#[test]
async fn test_category_filter_requires_value() {
    let (state, _) = state();
    let body = envelope(
        handlers::list_by_category(State(state), Ok(Json(CategoryRequest::default()))).await,
    )
    .await;
    assert_eq!(body["code"], 0);
}

#[test]
async fn test_register_and_login_envelopes() {
    let (state, _) = state();
    let creds = || Credentials {
        username: Some("alice1".to_string()),
        password: Some("secret1".to_string()),
    };

    let registered = envelope(handlers::register(State(state.clone()), Ok(Json(creds()))).await).await;
    assert_eq!(registered["code"], 1);
    assert_eq!(registered["data"]["userInfo"]["username"], "alice1");
    assert!(registered["data"]["userInfo"].get("passwordDigest").is_none());
    assert!(registered["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));

    let duplicate = envelope(handlers::register(State(state.clone()), Ok(Json(creds()))).await).await;
    assert_eq!(duplicate["code"], 0);
    assert_eq!(duplicate["msg"], "username is already taken");

    let logged_in = envelope(handlers::login(State(state.clone()), Ok(Json(creds()))).await).await;
    assert_eq!(logged_in["code"], 1);

    let wrong = Credentials {
        username: Some("alice1".to_string()),
        password: Some("nope".to_string()),
    };
    let rejected = envelope(handlers::login(State(state), Ok(Json(wrong))).await).await;
    assert_eq!(rejected["code"], 0);
    assert_eq!(rejected["msg"], "wrong password");
}

#[test]
async fn test_archive_is_newest_first() {
    let (state, _) = state();
    let mut old = article("Old", "c", "t");
    old.time = Some("2020-01-01".to_string());
    let mut new = article("New", "c", "t");
    new.time = Some("2024-06-01 12:00:00".to_string());
    seed(&state, old).await;
    seed(&state, new).await;

    let body = envelope(handlers::get_archive(State(state)).await).await;
    assert_eq!(body["data"][0]["title"], "New");
    assert_eq!(body["data"][1]["title"], "Old");
}
