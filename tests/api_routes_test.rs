mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::common::*;
use farmified_messaging::libs::server::{config::Config, router, state::State};

fn app(ctx: &TestContext) -> Router {
    let config = Config {
        port: 0,
        database_path: ctx.dir.path().join("messaging.db").display().to_string(),
        database_pool_size: 8,
    };
    router(State::from_service(config, ctx.service.clone()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    send(app, request).await
}

async fn create_conversation(app: &Router, a: &str, b: &str) -> String {
    let (status, body) = post(
        app,
        "/api/conversations",
        json!({ "user1Email": a, "user2Email": b }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "unexpected body {body}");
    body["conversation"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let ctx = setup();
    let (status, body) = get(&app(&ctx), "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_conversation_is_idempotent() {
    let ctx = setup_with_users();
    let app = app(&ctx);

    let first = create_conversation(&app, ALICE, BOB).await;
    let second = create_conversation(&app, BOB, ALICE).await;
    assert_eq!(first, second);

    let (_, body) = post(
        &app,
        "/api/conversations",
        json!({ "user1Email": ALICE, "user2Email": BOB }),
    )
    .await;
    let conversation = &body["conversation"];
    assert_eq!(conversation["participantA"], ALICE);
    assert_eq!(conversation["participantB"], BOB);
    assert_eq!(conversation["lastMessage"], "");
    assert!(conversation["updatedAt"].is_string());
}

#[tokio::test]
async fn test_create_conversation_validation() {
    let ctx = setup_with_users();
    let app = app(&ctx);

    let (status, body) = post(&app, "/api/conversations", json!({ "user1Email": ALICE })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Both user emails are required");

    let (status, _) = post(
        &app,
        "/api/conversations",
        json!({ "user1Email": ALICE, "user2Email": ALICE }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(
        &app,
        "/api/conversations",
        json!({ "user1Email": ALICE, "user2Email": "ghost@x.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ghost@x.com"));
}

#[tokio::test]
async fn test_send_and_list_messages() {
    let ctx = setup_with_users();
    let app = app(&ctx);
    let id = create_conversation(&app, ALICE, BOB).await;
    let uri = format!("/api/messages/{id}");

    let (status, sent) = post(&app, &uri, json!({ "senderEmail": ALICE, "message": " hi " })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["body"], "hi");
    assert_eq!(sent["senderEmail"], ALICE);
    assert_eq!(sent["conversationId"], id.as_str());

    let (status, _) = post(&app, &uri, json!({ "senderEmail": BOB, "message": "bye" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    let bodies: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["hi", "bye"]);

    for email in [ALICE, BOB] {
        let (status, body) = get(&app, &format!("/api/conversations/{email}")).await;
        assert_eq!(status, StatusCode::OK);
        let conversations = body["conversations"].as_array().unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0]["lastMessage"], "bye");
    }

    let (_, body) = get(&app, &format!("/api/conversations/{CAROL}")).await;
    assert!(body["conversations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_send_message_errors() {
    let ctx = setup_with_users();
    let app = app(&ctx);
    let id = create_conversation(&app, ALICE, BOB).await;
    let uri = format!("/api/messages/{id}");

    let (status, body) = post(&app, &uri, json!({ "senderEmail": ALICE, "message": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message cannot be empty");

    let (status, _) = post(&app, &uri, json!({ "senderEmail": CAROL, "message": "hey" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = farmified_messaging::RecordId::new();
    let (status, body) = post(
        &app,
        &format!("/api/messages/{unknown}"),
        json!({ "senderEmail": ALICE, "message": "hey" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Conversation not found");

    let (status, _) = get(&app, "/api/messages/not-an-id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = get(&app, &uri).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_user_lookups() {
    let ctx = setup_with_users();
    let app = app(&ctx);

    let (status, body) = get(&app, &format!("/api/user/email/{BOB}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], BOB);
    assert_eq!(body["user"]["userType"], "consumer");

    let id = body["user"]["id"].as_str().unwrap().to_string();
    let (status, body) = get(&app, &format!("/api/user/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["firstName"], "Bob");

    let (status, body) = get(&app, "/api/user/email/ghost@x.com").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = get(&app, "/api/user/12345").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let ctx = setup();
    let (status, _) = get(&app(&ctx), "/conversations/a@x.com").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
