//! Silence proxy.
//!
//! Browsers that cannot reach an Alertmanager directly create and expire
//! silences through karma. Only upstreams configured with `proxy: true` and
//! without `readonly` accept proxied requests, every other name answers 404.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use karma_models::Silence;
use karma_upstream::Upstream;
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Request headers never forwarded upstream.
const SKIPPED_REQUEST_HEADERS: [HeaderName; 6] = [
    header::HOST,
    header::ACCEPT_ENCODING,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::AUTHORIZATION,
];

/// Response headers dropped before answering, the compression layer sets its own.
const SKIPPED_RESPONSE_HEADERS: [HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::CONTENT_ENCODING,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
];

fn proxied_upstream<'a>(state: &'a AppState, name: &str) -> Option<&'a Upstream> {
    state
        .registry
        .get(name)
        .filter(|u| u.config().proxy && !u.config().readonly)
}

/// `POST <prefix>proxy/alertmanager/{name}/api/v2/silences`
pub async fn create_silence(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Extension(user): Extension<AuthUser>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let Some(upstream) = proxied_upstream(&state, &name) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let mut payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequest(format!("invalid silence body: {e}")))?;
    if state.auth.is_enabled() {
        if let Some(object) = payload.as_object_mut() {
            object.insert("createdBy".to_string(), Value::String(user.username.clone()));
        }
    }
    let silence: Silence = serde_json::from_value(payload.clone())
        .map_err(|e| ServerError::InvalidRequest(format!("invalid silence body: {e}")))?;
    state.acl.check(&user, &name, &silence)?;

    info!(
        alertmanager = %name,
        username = %user.username,
        silence = %silence.id,
        "Proxying silence update"
    );
    let body = serde_json::to_vec(&payload)?;
    forward(upstream, Method::POST, "api/v2/silences", query, &headers, body.into()).await
}

/// `DELETE <prefix>proxy/alertmanager/{name}/api/v2/silence/{id}`
pub async fn delete_silence(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, String)>,
    Extension(user): Extension<AuthUser>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response> {
    let Some(upstream) = proxied_upstream(&state, &name) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    info!(alertmanager = %name, username = %user.username, silence = %id, "Proxying silence expiry");
    let path = format!("api/v2/silence/{id}");
    forward(upstream, Method::DELETE, &path, query, &headers, Bytes::new()).await
}

async fn forward(
    upstream: &Upstream,
    method: Method,
    path: &str,
    query: Option<String>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let proxy_error = |reason: String| ServerError::Proxy {
        alertmanager: upstream.name().to_string(),
        reason,
    };

    let mut url = upstream.base_url().join(path).map_err(|e| proxy_error(e.to_string()))?;
    url.set_query(query.as_deref());
    debug!(alertmanager = %upstream.name(), method = %method, path = %url.path(), "Forwarding request");

    let mut request = upstream.client().request(method, url);
    for (name, value) in headers {
        if !SKIPPED_REQUEST_HEADERS.contains(name) {
            request = request.header(name, value);
        }
    }
    if let Some(auth) = upstream.basic_auth() {
        request = request.basic_auth(&auth.username, auth.password.as_deref());
    }

    let upstream_response = request.body(body).send().await.map_err(|e| proxy_error(e.to_string()))?;
    let status = upstream_response.status();
    let mut response_headers = upstream_response.headers().clone();
    for name in &SKIPPED_RESPONSE_HEADERS {
        response_headers.remove(name);
    }
    let bytes = upstream_response.bytes().await.map_err(|e| proxy_error(e.to_string()))?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AclRuleConfig, AclScopeConfig, AlertmanagerServer, BasicAuthUser, Config};
    use crate::routes::create_router;
    use axum::http::Request;
    use axum::routing::{delete, post};
    use axum::Router;
    use base64::Engine;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use serde_json::json;
    use tower::ServiceExt;

    #[derive(Default)]
    struct Captured {
        body: Option<Value>,
        deleted: Option<String>,
        authorization: Option<String>,
    }

    async fn fake_upstream(captured: Arc<Mutex<Captured>>) -> String {
        let on_post = Arc::clone(&captured);
        let on_delete = Arc::clone(&captured);
        let router = Router::new()
            .route(
                "/api/v2/silences",
                post(move |headers: HeaderMap, axum::Json(body): axum::Json<Value>| {
                    let captured = Arc::clone(&on_post);
                    async move {
                        let mut captured = captured.lock();
                        captured.body = Some(body);
                        captured.authorization = headers
                            .get(header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        axum::Json(json!({"silenceID": "new-id"}))
                    }
                }),
            )
            .route(
                "/api/v2/silence/{id}",
                delete(move |Path(id): Path<String>| {
                    let captured = Arc::clone(&on_delete);
                    async move {
                        captured.lock().deleted = Some(id);
                        StatusCode::OK
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        format!("http://{addr}")
    }

    async fn setup(mut config: Config) -> (Router, Arc<Mutex<Captured>>) {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let uri = fake_upstream(Arc::clone(&captured)).await;
        let host = uri.trim_start_matches("http://");
        config.alertmanager.servers = vec![
            AlertmanagerServer {
                name: "proxied".to_string(),
                uri: format!("http://am:secret@{host}"),
                proxy: true,
                ..Default::default()
            },
            AlertmanagerServer {
                name: "direct".to_string(),
                uri: uri.clone(),
                ..Default::default()
            },
        ];
        config.history.enabled = false;
        let state = Arc::new(AppState::new(config).unwrap());
        (create_router(state), captured)
    }

    fn silence_body() -> String {
        json!({
            "matchers": [{"name": "alertname", "value": "Host_Down", "isRegex": false}],
            "startsAt": "2024-01-01T00:00:00Z",
            "endsAt": "2024-01-01T01:00:00Z",
            "createdBy": "someone-else",
            "comment": "maintenance"
        })
        .to_string()
    }

    fn basic(credentials: &str) -> String {
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(credentials))
    }

    fn with_john(mut config: Config) -> Config {
        config.authentication.basic_auth.users = vec![BasicAuthUser {
            username: "john".to_string(),
            password: "foobar".to_string(),
        }];
        config
    }

    fn post_silence(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/proxy/alertmanager/proxied/api/v2/silences")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(silence_body())).unwrap()
    }

    #[tokio::test]
    async fn rewrites_author_when_authenticated() {
        let (app, captured) = setup(with_john(Config::default())).await;

        let response = app.oneshot(post_silence(Some(&basic("john:foobar")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["silenceID"], "new-id");

        let captured = captured.lock();
        let sent = captured.body.as_ref().unwrap();
        assert_eq!(sent["createdBy"], "john");
        assert_eq!(sent["comment"], "maintenance");
        // Credentials come from the upstream URI, not from the client.
        assert_eq!(captured.authorization.as_deref(), Some(basic("am:secret").as_str()));
    }

    #[tokio::test]
    async fn keeps_author_without_authentication() {
        let (app, captured) = setup(Config::default()).await;
        let response = app.oneshot(post_silence(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(captured.lock().body.as_ref().unwrap()["createdBy"], "someone-else");
    }

    #[tokio::test]
    async fn rejects_unauthenticated() {
        let (app, captured) = setup(with_john(Config::default())).await;
        let response = app.oneshot(post_silence(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(captured.lock().body.is_none());
    }

    #[tokio::test]
    async fn acl_block_answers_400_without_forwarding() {
        let mut config = with_john(Config::default());
        config.silences.acl.rules = vec![AclRuleConfig {
            action: "block".to_string(),
            reason: "silences are frozen".to_string(),
            scope: AclScopeConfig::default(),
            ..Default::default()
        }];
        let (app, captured) = setup(config).await;

        let response = app.oneshot(post_silence(Some(&basic("john:foobar")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("silences are frozen"));
        assert!(captured.lock().body.is_none());
    }

    #[tokio::test]
    async fn invalid_body() {
        let (app, _) = setup(Config::default()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/proxy/alertmanager/proxied/api/v2/silences")
            .body(Body::from("{\"matchers\": []}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deletes() {
        let (app, captured) = setup(Config::default()).await;
        let request = Request::builder()
            .method("DELETE")
            .uri("/proxy/alertmanager/proxied/api/v2/silence/abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(captured.lock().deleted.as_deref(), Some("abc-123"));
    }

    #[tokio::test]
    async fn unknown_or_direct_upstreams_are_not_proxied() {
        let (app, _) = setup(Config::default()).await;
        for uri in [
            "/proxy/alertmanager/direct/api/v2/silences",
            "/proxy/alertmanager/missing/api/v2/silences",
        ] {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::from(silence_body()))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }
}
