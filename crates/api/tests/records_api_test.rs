use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use datagate_api::create_app;
use datagate_core::{DataRecord, DataStore, TaskEnvelope, TaskQueue};
use datagate_dispatcher::TaskDispatcher;
use datagate_infrastructure::{InMemoryTaskQueue, MemoryDataStore};

const QUEUE: &str = "task_queue";

struct TestContext {
    app: Router,
    queue: Arc<InMemoryTaskQueue>,
}

async fn test_context() -> TestContext {
    let store = Arc::new(MemoryDataStore::new());
    let seeded: DataRecord = serde_json::from_value(json!({"value": 42, "name": "answer"})).unwrap();
    store.insert(&seeded).await.unwrap();

    let queue = Arc::new(InMemoryTaskQueue::new());
    let dispatcher = Arc::new(TaskDispatcher::new(
        Arc::clone(&queue) as Arc<dyn TaskQueue>,
        QUEUE,
        "backend",
        "node-test",
    ));

    TestContext {
        app: create_app(store as Arc<dyn DataStore>, dispatcher),
        queue,
    }
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// 取出并确认队列中的下一条投递
async fn drain_one(queue: &InMemoryTaskQueue) -> TaskEnvelope {
    let delivery = queue
        .next_delivery(QUEUE)
        .await
        .unwrap()
        .expect("队列中没有投递");
    queue.ack(delivery.delivery_tag).await.unwrap();
    delivery.envelope().unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_instance() {
    let ctx = test_context().await;

    let response = ctx.app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "backend");
    assert_eq!(body["instance"], "node-test");

    // 健康检查不触发任务分发
    assert_eq!(ctx.queue.queue_depth(QUEUE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_records_dispatches_getall() {
    let ctx = test_context().await;

    let response = ctx.app.oneshot(get("/api/testdata")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["value"], 42);

    let envelope = drain_one(&ctx.queue).await;
    assert_eq!(envelope.task, "getall");
    assert_eq!(envelope.service, "backend");
    assert_eq!(envelope.instance, "node-test");
}

#[tokio::test]
async fn test_get_record_dispatches_getone_with_value() {
    let ctx = test_context().await;

    let response = ctx.app.oneshot(get("/api/testdata/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["value"], 42);
    assert_eq!(body["name"], "answer");

    let envelope = drain_one(&ctx.queue).await;
    assert_eq!(envelope.task, "getone");
    assert_eq!(envelope.extra.get("value"), Some(&json!(42)));
}

#[tokio::test]
async fn test_missing_record_returns_404_but_still_dispatches() {
    let ctx = test_context().await;

    let response = ctx.app.oneshot(get("/api/testdata/7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // 分发发生在存储查询之前，NotFound 不阻止任务入队
    let envelope = drain_one(&ctx.queue).await;
    assert_eq!(envelope.task, "getone");
    assert_eq!(envelope.extra.get("value"), Some(&json!(7)));
}

#[tokio::test]
async fn test_create_record_returns_201() {
    let ctx = test_context().await;

    let response = ctx
        .app
        .clone()
        .oneshot(post_json(
            "/api/testdata",
            json!({"value": 1, "name": "first", "color": "red"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["value"], 1);
    assert_eq!(body["color"], "red");

    let envelope = drain_one(&ctx.queue).await;
    assert_eq!(envelope.task, "post-call");

    // 新记录可读
    let response = ctx.app.oneshot(get("/api/testdata/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_merges_fields_and_dispatches() {
    let ctx = test_context().await;

    let response = ctx
        .app
        .oneshot(post_json(
            "/api/testdata/update/42",
            json!({"name": "x", "color": "blue"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "x");
    assert_eq!(body["color"], "blue");

    let envelope = drain_one(&ctx.queue).await;
    assert_eq!(envelope.task, "update");
    assert_eq!(envelope.extra.get("value"), Some(&json!(42)));
    assert_eq!(envelope.extra.get("updates"), Some(&json!({"name": "x", "color": "blue"})));
}

#[tokio::test]
async fn test_update_missing_record_returns_404_but_still_dispatches() {
    let ctx = test_context().await;

    let response = ctx
        .app
        .oneshot(post_json("/api/testdata/update/7", json!({"name": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let envelope = drain_one(&ctx.queue).await;
    assert_eq!(envelope.task, "update");
}

#[tokio::test]
async fn test_non_integer_key_is_client_error() {
    let ctx = test_context().await;

    let response = ctx.app.oneshot(get("/api/testdata/abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // 路径解析失败时请求未进入处理器，不分发任务
    assert_eq!(ctx.queue.queue_depth(QUEUE).await.unwrap(), 0);
}
