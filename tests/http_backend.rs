//! HTTP backend against a live REST collection.
//!
//! Each test binds a small axum server on an ephemeral port and drives a
//! `RemoteStore` through `HttpBackend`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use collection_store::{
    Binding, CollectionEvent, HttpBackend, HttpBackendConfig, Page, PageRequest, Post,
    RemoteStore, StoreError,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct Db {
    posts: Vec<Post>,
    next_id: u64,
}

type SharedDb = Arc<Mutex<Db>>;

#[derive(Deserialize)]
struct PageParams {
    page: Option<u32>,
    size: Option<u32>,
}

async fn list_posts(State(db): State<SharedDb>, Query(params): Query<PageParams>) -> Json<Page<Post>> {
    let db = db.lock().await;
    let request = match (params.page, params.size) {
        (Some(page), Some(size)) => Some(PageRequest::new(page, size)),
        _ => None,
    };
    Json(Page::slice(&db.posts, request))
}

async fn create_post(State(db): State<SharedDb>, Json(mut post): Json<Post>) -> (StatusCode, Json<Post>) {
    let mut db = db.lock().await;
    db.next_id += 1;
    post.id = Some(format!("p{}", db.next_id));
    db.posts.push(post.clone());
    (StatusCode::CREATED, Json(post))
}

async fn update_post(
    State(db): State<SharedDb>,
    Path(id): Path<String>,
    Json(mut post): Json<Post>,
) -> Result<Json<Post>, StatusCode> {
    let mut db = db.lock().await;
    let slot = db
        .posts
        .iter_mut()
        .find(|p| p.id.as_deref() == Some(id.as_str()))
        .ok_or(StatusCode::NOT_FOUND)?;
    post.id = Some(id);
    *slot = post.clone();
    Ok(Json(post))
}

async fn delete_post(State(db): State<SharedDb>, Path(id): Path<String>) -> StatusCode {
    let mut db = db.lock().await;
    let before = db.posts.len();
    db.posts.retain(|p| p.id.as_deref() != Some(id.as_str()));
    if db.posts.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn spawn_server() -> (String, SharedDb) {
    let db = SharedDb::default();
    let app = Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/:id", axum::routing::put(update_post).delete(delete_post))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .with_state(Arc::clone(&db));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), db)
}

fn remote(base: &str, path: &str) -> RemoteStore<Post, HttpBackend<Post>> {
    let backend = HttpBackend::new(HttpBackendConfig {
        base_url: format!("{}{}", base, path),
        timeout_ms: 2_000,
    })
    .unwrap();
    RemoteStore::new(backend)
}

#[tokio::test]
async fn test_crud_round_trip() {
    let (base, db) = spawn_server().await;
    let store = remote(&base, "/api/posts");
    let handle = store.subscribe();

    let first = store.add(Post::new("First post", "Hello")).await.unwrap();
    let second = store.add(Post::new("Second post", "World")).await.unwrap();
    assert_eq!(first.id.as_deref(), Some("p1"));
    assert_eq!(second.id.as_deref(), Some("p2"));

    store
        .replace("p1", Post::new("First, edited", "Hello again"))
        .await
        .unwrap();
    store.remove("p2").await.unwrap();

    let titles: Vec<String> = store.list().iter().map(|p| p.title.clone()).collect();
    assert_eq!(titles, vec!["First, edited"]);
    assert_eq!(db.lock().await.posts.len(), 1);

    let mut deliveries = 0;
    while let Some(CollectionEvent::Snapshot(_)) = handle.try_recv().unwrap() {
        deliveries += 1;
    }
    assert_eq!(deliveries, 4);
}

#[tokio::test]
async fn test_load_page() {
    let (base, db) = spawn_server().await;
    {
        let mut db = db.lock().await;
        for i in 1..=5 {
            db.posts.push(Post::new(format!("Post {}", i), "x").with_id(format!("p{}", i)));
        }
    }

    let store = remote(&base, "/api/posts");
    let total = store.load(Some(PageRequest::new(2, 2))).await.unwrap();

    assert_eq!(total, 5);
    let ids: Vec<String> = store.list().iter().filter_map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec!["p3", "p4"]);
}

#[tokio::test]
async fn test_delete_missing_is_not_found() {
    let (base, _db) = spawn_server().await;
    let store = remote(&base, "/api/posts");
    store.add(Post::new("Only one", "x")).await.unwrap();

    let before = store.list();
    let handle = store.subscribe();

    let result = store.remove("missing-id").await;
    assert!(matches!(result, Err(StoreError::NotFound(ref id)) if id == "missing-id"));
    assert!(handle.try_recv().unwrap().is_none());
    assert!(store.list().same_as(&before));
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let (base, _db) = spawn_server().await;
    let store = remote(&base, "/api/posts");

    let result = store.replace("p9", Post::new("Nobody", "x")).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let (base, _db) = spawn_server().await;
    let store = remote(&base, "/broken");

    let result = store.load(None).await;
    assert!(matches!(result, Err(StoreError::Transport(_))));
    assert!(store.list().is_empty());
}

#[tokio::test]
async fn test_invalid_post_never_sent() {
    let (base, db) = spawn_server().await;
    let store = remote(&base, "/api/posts");

    let result = store.add(Post::new("Hi", "too short a title")).await;
    assert!(matches!(result, Err(StoreError::Validation(_))));
    assert!(db.lock().await.posts.is_empty());
}

#[tokio::test]
async fn test_binding_follows_remote_store() {
    let (base, _db) = spawn_server().await;
    let store = remote(&base, "/api/posts");
    let mut view = Binding::attach(store.local());

    store.add(Post::new("Rendered", "x")).await.unwrap();
    assert_eq!(view.sync(), 1);
    assert_eq!(view.current().len(), 1);

    view.release();
    assert_eq!(store.local().subscription_count(), 0);
}
