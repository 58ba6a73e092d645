use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use parlor_api::routes::rest_routes;
use parlor_api::state::{AppState, AppStateInner};
use parlor_db::Database;
use parlor_gateway::hub::BroadcastHub;
use parlor_types::api::Claims;
use parlor_types::events::EventKind;
use parlor_types::limits::{ContentLimits, PageLimits};

const SECRET: &str = "integration-secret";

fn state() -> AppState {
    let db = Database::open_in_memory().unwrap();
    db.with_conn_mut(|conn| {
        conn.execute("INSERT INTO rooms (id, name) VALUES (7, 'seven')", [])?;
        conn.execute("INSERT INTO rooms (id, name, is_public) VALUES (8, 'eight', 0)", [])?;
        Ok(())
    })
    .unwrap();
    Arc::new(AppStateInner::new(
        Arc::new(db),
        BroadcastHub::new(),
        PageLimits { default: 3, max: 4 },
        ContentLimits::DEFAULT,
        SECRET.to_string(),
    ))
}

fn token(user_id: i64) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, bearer: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn post_message(app: &Router, room: i64, user: i64, content: &str) -> Value {
    let body = json!({ "content": content }).to_string();
    let (status, value) = send(
        app,
        post(&format!("/rooms/{room}/messages"), Some(&token(user)), &body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    value
}

fn ids(page: &Value) -> Vec<i64> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn health_and_rooms() {
    let app = rest_routes(state());

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");

    let (status, rooms) = send(&app, get("/rooms")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        rooms,
        json!([
            { "id": 1, "name": "general", "is_public": true },
            { "id": 7, "name": "seven", "is_public": true },
            { "id": 8, "name": "eight", "is_public": false },
        ])
    );
}

#[tokio::test]
async fn create_returns_canonical_message() {
    let app = rest_routes(state());
    let msg = post_message(&app, 7, 42, "  hello there \n").await;

    assert_eq!(msg["room_id"], 7);
    assert_eq!(msg["user_id"], 42);
    assert_eq!(msg["content"], "hello there");
    assert!(msg["id"].as_i64().unwrap() > 0);
    let ts = msg["created_at"].as_str().unwrap();
    assert!(ts.ends_with('Z'), "{ts}");
    assert_eq!(ts.split('.').nth(1).map(|f| f.len()), Some(7), "{ts}");
}

#[tokio::test]
async fn create_requires_a_valid_token() {
    let app = rest_routes(state());
    let body = json!({ "content": "hi" }).to_string();

    let (status, err) = send(&app, post("/rooms/7/messages", None, &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, post("/rooms/7/messages", Some("garbage"), &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, page) = send(&app, get("/rooms/7/messages")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ids(&page).is_empty());
}

#[tokio::test]
async fn create_validates_input() {
    let app = rest_routes(state());
    let auth = token(1);

    let cases = [
        ("/rooms/7/messages", json!({ "content": "" }).to_string()),
        ("/rooms/7/messages", json!({ "content": " \t\r\n " }).to_string()),
        ("/rooms/7/messages", json!({ "content": "x".repeat(2001) }).to_string()),
        ("/rooms/7/messages", "{not json".to_string()),
        ("/rooms/7/messages", json!({ "text": "hi" }).to_string()),
        ("/rooms/abc/messages", json!({ "content": "hi" }).to_string()),
        ("/rooms/0/messages", json!({ "content": "hi" }).to_string()),
    ];
    for (uri, body) in cases {
        let (status, err) = send(&app, post(uri, Some(&auth), &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
        assert_eq!(err["code"], "VALIDATION_FAILED");
    }

    let (_, err) = send(
        &app,
        post("/rooms/7/messages", Some(&auth), &json!({ "content": "" }).to_string()),
    )
    .await;
    assert_eq!(err["error"], "content length 1..2000");

    let msg = post_message(&app, 7, 1, &"é".repeat(2000)).await;
    assert_eq!(msg["content"].as_str().unwrap().chars().count(), 2000);
}

#[tokio::test]
async fn create_in_unknown_room_is_internal() {
    let app = rest_routes(state());
    let body = json!({ "content": "hi" }).to_string();
    let (status, err) = send(&app, post("/rooms/999/messages", Some(&token(1)), &body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err, json!({ "error": "insert error", "code": "INTERNAL" }));
}

#[tokio::test]
async fn create_fans_out_to_live_sessions() {
    let state = state();
    let app = rest_routes(state.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (other_tx, mut other_rx) = mpsc::unbounded_channel();
    let _sub = state.hub.subscribe(7, Uuid::new_v4(), tx);
    let _other = state.hub.subscribe(8, Uuid::new_v4(), other_tx);

    let msg = post_message(&app, 7, 5, "broadcast me").await;

    let event = rx.try_recv().unwrap();
    assert_eq!(event.kind, EventKind::MessageCreate);
    let data = event.data.as_ref().unwrap();
    assert_eq!(data.id, msg["id"].as_i64().unwrap());
    assert_eq!(data.content, "broadcast me");
    assert!(other_rx.try_recv().is_err());
}

#[tokio::test]
async fn history_pages_through_the_room() {
    let app = rest_routes(state());
    for i in 1..=5 {
        post_message(&app, 7, 1, &format!("m{i}")).await;
    }
    post_message(&app, 8, 1, "elsewhere").await;

    let (status, first) = send(&app, get("/rooms/7/messages?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&first), vec![5, 4]);
    assert_eq!(first["page_info"]["has_more"], true);
    assert_eq!(first["page_info"]["next_before_id"], 4);

    let ts = first["page_info"]["next_before_ts"].as_str().unwrap().to_string();
    let uri = format!("/rooms/7/messages?limit=2&before_ts={}&before_id=4", ts.replace('+', "%2B"));
    let (_, second) = send(&app, get(&uri)).await;
    assert_eq!(ids(&second), vec![3, 2]);
    assert_eq!(second["page_info"]["has_more"], true);

    let ts = second["page_info"]["next_before_ts"].as_str().unwrap().to_string();
    let uri = format!("/rooms/7/messages?limit=2&before_ts={ts}&before_id=2");
    let (_, third) = send(&app, get(&uri)).await;
    assert_eq!(ids(&third), vec![1]);
    assert_eq!(third["page_info"], json!({ "has_more": false }));
}

#[tokio::test]
async fn history_limits_default_and_cap() {
    let app = rest_routes(state());
    for i in 1..=6 {
        post_message(&app, 7, 1, &format!("m{i}")).await;
    }

    let (_, page) = send(&app, get("/rooms/7/messages")).await;
    assert_eq!(ids(&page), vec![6, 5, 4]);

    let (_, page) = send(&app, get("/rooms/7/messages?limit=&before_ts=&before_id=")).await;
    assert_eq!(ids(&page), vec![6, 5, 4]);

    let (status, page) = send(&app, get("/rooms/7/messages?limit=1000")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page), vec![6, 5, 4, 3]);
}

#[tokio::test]
async fn history_rejects_bad_queries() {
    let app = rest_routes(state());
    let bad = [
        "/rooms/7/messages?limit=0",
        "/rooms/7/messages?limit=-1",
        "/rooms/7/messages?limit=lots",
        "/rooms/7/messages?before_id=3",
        "/rooms/7/messages?before_ts=2024-01-01T00:00:00Z",
        "/rooms/7/messages?before_ts=tuesday&before_id=3",
        "/rooms/7/messages?before_ts=2024-01-01T00:00:00Z&before_id=x",
        "/rooms/nope/messages",
    ];
    for uri in bad {
        let (status, err) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(err["code"], "VALIDATION_FAILED", "{uri}");
    }
}
