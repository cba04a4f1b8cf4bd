use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::get,
};
use http_body_util::BodyExt;
use pureharvest_api::{
    config::AppConfig,
    entity::enums::Role,
    middleware::auth::{AuthUser, issue_token},
};
use tower::ServiceExt;
use uuid::Uuid;

fn config() -> Arc<AppConfig> {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "postgres://unused"),
        ("JWT_SECRET", "extractor-secret"),
    ]);
    Arc::new(AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap())
}

async fn whoami(user: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "id": user.user_id, "role": user.role }))
}

fn app(config: Arc<AppConfig>) -> Router {
    Router::new().route("/whoami", get(whoami)).with_state(config)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let response = app(config())
        .oneshot(Request::get("/whoami").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert!(body["data"]["error"].is_string());
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let response = app(config())
        .oneshot(
            Request::get("/whoami")
                .header(header::AUTHORIZATION, "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cookie_is_not_a_credential() {
    let cfg = config();
    let (token, _) = issue_token(&cfg, Uuid::new_v4(), "b@example.com", Role::Buyer).unwrap();
    let response = app(cfg)
        .oneshot(
            Request::get("/whoami")
                .header(header::COOKIE, format!("token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_bearer_token_resolves_user() {
    let cfg = config();
    let id = Uuid::new_v4();
    let (token, _) = issue_token(&cfg, id, "farmer@example.com", Role::Farmer).unwrap();

    let response = app(cfg)
        .oneshot(
            Request::get("/whoami")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["role"], "farmer");
}
