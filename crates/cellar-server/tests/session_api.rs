//! Session API integration tests.
//!
//! These drive the full router with `oneshot`, carrying cookies from one
//! response into the next request the way a browser would.

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use cellar_server::{Server, ServerConfig, SessionResponse, SweepResponse};
use cellar_session::{SessionStore, StoreConfig};

const KEY: &[u8] = b"server-integration-secret-key-32bytes";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    async fn start(admin_token: Option<&str>) -> Result<Self> {
        let dir = TempDir::new()?;
        let store = SessionStore::open(
            StoreConfig::new(KEY).with_storage_location(dir.path().join("sessions.sqlite")),
        )
        .await?;
        let config = ServerConfig::new(admin_token.map(str::to_string)).with_request_logging(false);
        let router = Server::new(store, config).router();
        Ok(Self { router, _dir: dir })
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.router.clone().oneshot(request).await?)
    }
}

fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// The `name=value` pair of the response's session cookie.
fn cookie_pair(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn test_get_without_cookie_returns_new_session() -> Result<()> {
    let app = TestApp::start(None).await?;

    let response = app.send(request("GET", "/api/v1/session", None, None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_pair(&response).is_none());

    let session: SessionResponse = json_body(response).await?;
    assert!(session.is_new);
    assert!(session.id.is_none());
    assert!(session.values.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_put_then_get_round_trips() -> Result<()> {
    let app = TestApp::start(None).await?;

    let response = app
        .send(request(
            "PUT",
            "/api/v1/session",
            None,
            Some(json!({"user": "ada", "cart": [1, 2]})),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(&response).expect("PUT should set the session cookie");
    let created: SessionResponse = json_body(response).await?;
    assert!(created.is_new);
    assert!(created.id.is_some());

    let response = app
        .send(request("GET", "/api/v1/session", Some(&cookie), None))
        .await?;
    let loaded: SessionResponse = json_body(response).await?;
    assert!(!loaded.is_new);
    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.values.get("user"), Some(&json!("ada")));
    assert_eq!(loaded.values.get("cart"), Some(&json!([1, 2])));
    Ok(())
}

#[tokio::test]
async fn test_put_null_removes_key() -> Result<()> {
    let app = TestApp::start(None).await?;

    let response = app
        .send(request(
            "PUT",
            "/api/v1/session",
            None,
            Some(json!({"a": 1, "b": 2})),
        ))
        .await?;
    let cookie = cookie_pair(&response).unwrap();

    let response = app
        .send(request(
            "PUT",
            "/api/v1/session",
            Some(&cookie),
            Some(json!({"a": null, "c": 3})),
        ))
        .await?;
    let updated: SessionResponse = json_body(response).await?;

    assert!(!updated.is_new);
    assert!(!updated.values.contains_key("a"));
    assert_eq!(updated.values.get("b"), Some(&json!(2)));
    assert_eq!(updated.values.get("c"), Some(&json!(3)));
    Ok(())
}

#[tokio::test]
async fn test_put_rejects_non_object_body() -> Result<()> {
    let app = TestApp::start(None).await?;

    let response = app
        .send(request("PUT", "/api/v1/session", None, Some(json!([1, 2]))))
        .await?;
    assert!(response.status().is_client_error());
    Ok(())
}

#[tokio::test]
async fn test_forged_cookie_gets_new_session() -> Result<()> {
    let app = TestApp::start(None).await?;

    let forged = format!("session-id={}.AAAA", "a".repeat(43));
    let response = app
        .send(request("GET", "/api/v1/session", Some(&forged), None))
        .await?;
    let session: SessionResponse = json_body(response).await?;
    assert!(session.is_new);
    Ok(())
}

#[tokio::test]
async fn test_delete_clears_cookie_and_session() -> Result<()> {
    let app = TestApp::start(None).await?;

    let response = app
        .send(request("PUT", "/api/v1/session", None, Some(json!({"user": "ada"}))))
        .await?;
    let cookie = cookie_pair(&response).unwrap();

    let response = app
        .send(request("DELETE", "/api/v1/session", Some(&cookie), None))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let removal = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()?
        .to_string();
    assert!(removal.contains("Max-Age=0"));

    let response = app
        .send(request("GET", "/api/v1/session", Some(&cookie), None))
        .await?;
    let session: SessionResponse = json_body(response).await?;
    assert!(session.is_new);
    Ok(())
}

#[tokio::test]
async fn test_admin_revoke() -> Result<()> {
    let app = TestApp::start(None).await?;

    let response = app
        .send(request("PUT", "/api/v1/session", None, Some(json!({"user": "ada"}))))
        .await?;
    let cookie = cookie_pair(&response).unwrap();
    let created: SessionResponse = json_body(response).await?;
    let id = created.id.unwrap();

    let uri = format!("/api/v1/admin/sessions/{}", id);
    let response = app.send(request("DELETE", &uri, None, None)).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(request("GET", "/api/v1/session", Some(&cookie), None))
        .await?;
    let session: SessionResponse = json_body(response).await?;
    assert!(session.is_new);

    let response = app.send(request("DELETE", &uri, None, None)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = json_body(response).await?;
    assert_eq!(body["code"], "not_found");
    Ok(())
}

#[tokio::test]
async fn test_admin_requires_token_when_configured() -> Result<()> {
    let app = TestApp::start(Some("admin-secret")).await?;
    let uri = "/api/v1/admin/sessions/whatever";

    let response = app.send(request("DELETE", uri, None, None)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())?;
    assert_eq!(app.send(wrong).await?.status(), StatusCode::UNAUTHORIZED);

    let right = Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, "Bearer admin-secret")
        .body(Body::empty())?;
    assert_eq!(app.send(right).await?.status(), StatusCode::NOT_FOUND);

    // Session routes stay open.
    let response = app.send(request("GET", "/api/v1/session", None, None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_admin_sweep() -> Result<()> {
    let app = TestApp::start(None).await?;

    let response = app
        .send(request("POST", "/api/v1/admin/sweep", None, None))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let report: SweepResponse = json_body(response).await?;
    assert!(report.ran);
    assert_eq!(report.reclaimed, 0);
    Ok(())
}
