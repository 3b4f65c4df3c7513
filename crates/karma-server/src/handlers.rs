//! HTTP request handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, RawQuery, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use karma_filters::parse_filters;
use karma_models::api::{AlertList, AlertsRequest, AuthenticationInfo, Counters, HistoryRequest, VersionInfo};
use karma_models::{natural_cmp, sha1_hex};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::aggregate::{self, SilenceQuery, VERSION};
use crate::auth::AuthUser;
use crate::error::{Result, ServerError};
use crate::state::AppState;

fn json_body(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> &'a str {
    params.get(name).map(String::as_str).unwrap_or_default()
}

fn flag(params: &HashMap<String, String>, name: &str) -> bool {
    matches!(param(params, name), "1" | "true")
}

/// Repeated `q` parameters of a raw query string.
fn filter_params(query: Option<&str>) -> Vec<String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .filter(|(k, _)| k == "q")
                .map(|(_, v)| v.into_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `GET /` renders the UI shell.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let config = &state.config;
    let b64 = base64::engine::general_purpose::STANDARD;
    let default_filter = b64.encode(serde_json::to_vec(&config.filters.default)?);
    let defaults = b64.encode(serde_json::to_vec(&config.ui)?);
    let prefix = &config.listen.prefix;
    let name = escape_html(&config.karma.name);

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{name}</title>
<link rel="stylesheet" href="{prefix}custom.css">
</head>
<body>
<div id="root" data-version="{VERSION}" data-name="{name}" data-default-filter="{default_filter}" data-defaults="{defaults}"></div>
<script src="{prefix}custom.js"></script>
</body>
</html>
"#
    )))
}

/// `POST /alerts.json`
///
/// The response body is cached per request, the per user parts are
/// overlaid afterwards.
pub async fn alerts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Response> {
    let request: AlertsRequest = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequest(format!("invalid alerts request: {e}")))?;
    let key = sha1_hex(serde_json::to_vec(&request)?);
    let generation = state.cache.generation();

    let cached = match state.cache.get_alerts(&key) {
        Some(cached) => {
            debug!(key = %key, "Alerts response served from cache");
            cached
        }
        None => {
            let response = aggregate::alerts_response(&state.registry, &state.config, &request);
            let encoded = serde_json::to_vec(&response)?;
            state.cache.put_alerts(key, generation, &encoded);
            encoded
        }
    };

    let mut response: Value = serde_json::from_slice(&cached)?;
    response["timestamp"] = json!(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    response["settings"]["silenceForm"]["author"] = json!(user.username);
    response["authentication"] = serde_json::to_value(AuthenticationInfo {
        enabled: state.auth.is_enabled(),
        username: user.username,
    })?;
    Ok(json_body(serde_json::to_vec(&response)?))
}

/// `GET /autocomplete.json?term=`
pub async fn autocomplete(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    let term = param(&params, "term");
    if term.is_empty() {
        return Err(ServerError::InvalidRequest("missing term=<token> parameter".to_string()));
    }
    let key = uri.to_string();
    let generation = state.cache.generation();
    if let Some(cached) = state.cache.get(&key) {
        return Ok(json_body(cached));
    }

    let mut values: Vec<String> = state
        .registry
        .dedup_autocomplete()
        .into_iter()
        .filter(|hint| hint.matches_prefix(term))
        .map(|hint| hint.value)
        .collect();
    values.sort_unstable_by(|a, b| b.cmp(a));

    let body = serde_json::to_vec(&values)?;
    state.cache.put(key, generation, body.clone());
    Ok(json_body(body))
}

/// `GET /labelNames.json?term=`
pub async fn label_names(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<String>>> {
    let term = param(&params, "term").to_lowercase();
    let mut names: Vec<String> = state
        .registry
        .dedup_known_labels()
        .into_iter()
        .filter(|name| name.to_lowercase().contains(&term))
        .collect();
    names.sort_by(|a, b| natural_cmp(a, b));
    Ok(Json(names))
}

/// `GET /labelValues.json?name=`
pub async fn label_values(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    let name = param(&params, "name");
    if name.is_empty() {
        return Err(ServerError::InvalidRequest("missing name=<label> parameter".to_string()));
    }
    let key = uri.to_string();
    let generation = state.cache.generation();
    if let Some(cached) = state.cache.get(&key) {
        return Ok(json_body(cached));
    }

    let mut values = state.registry.dedup_known_label_values(name);
    values.sort_by(|a, b| natural_cmp(a, b));
    let body = serde_json::to_vec(&values)?;
    state.cache.put(key, generation, body.clone());
    Ok(json_body(body))
}

/// `GET /silences.json?showExpired=&searchTerm=&sortReverse=`
pub async fn silences(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    let key = uri.to_string();
    let generation = state.cache.generation();
    if let Some(cached) = state.cache.get(&key) {
        return Ok(json_body(cached));
    }

    let query = SilenceQuery {
        show_expired: flag(&params, "showExpired"),
        search_term: param(&params, "searchTerm").to_string(),
        sort_reverse: flag(&params, "sortReverse"),
    };
    let managed = state.registry.managed_silences(Utc::now());
    let selected = aggregate::select_silences(&state.registry, managed, &query);

    let body = serde_json::to_vec(&selected)?;
    state.cache.put(key, generation, body.clone());
    Ok(json_body(body))
}

/// `POST /history.json`
pub async fn history(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let Some(poller) = &state.history else {
        return Err(ServerError::History("history is disabled".to_string()));
    };
    let request: HistoryRequest = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequest(format!("invalid history request: {e}")))?;
    let response = poller.history(&request.sources, &request.labels).await;
    Ok(json_body(serde_json::to_vec(&response)?))
}

/// `GET /counters.json?q=`
pub async fn counters(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Json<Counters> {
    let mut filters = parse_filters(&filter_params(query.as_deref()));
    let groups = aggregate::filtered_groups(&state.registry, &mut filters);
    Json(Counters {
        total: groups.iter().map(|g| g.alerts.len()).sum(),
        counters: aggregate::count_labels(&groups, aggregate::has_multiple_clusters(&state.registry)),
    })
}

/// `GET /alertList.json?q=`
pub async fn alert_list(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Json<AlertList> {
    let mut filters = parse_filters(&filter_params(query.as_deref()));
    let groups = aggregate::filtered_groups(&state.registry, &mut filters);
    Json(AlertList {
        alerts: aggregate::alert_list(&groups),
    })
}

async fn custom_asset(path: Option<&std::path::Path>, content_type: &'static str) -> Response {
    let body = match path {
        None => Vec::new(),
        Some(path) => match tokio::fs::read(path).await {
            Ok(body) => body,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read custom asset");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
    };
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// `GET /custom.css`
pub async fn custom_css(State(state): State<Arc<AppState>>) -> Response {
    custom_asset(state.config.custom.css.as_deref(), "text/css").await
}

/// `GET /custom.js`
pub async fn custom_js(State(state): State<Arc<AppState>>) -> Response {
    custom_asset(state.config.custom.js.as_deref(), "application/javascript").await
}

/// `GET /metrics`
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let body = state.metrics.encode(&state.registry);
    ([(header::CONTENT_TYPE, karma_upstream::UpstreamMetrics::content_type())], body).into_response()
}

/// `GET /health`
pub async fn health() -> &'static str {
    "Pong"
}

/// `GET /robots.txt`
pub async fn robots() -> &'static str {
    "User-agent: *\nDisallow: /\n"
}

/// `GET /version`
pub async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: VERSION.to_string(),
    })
}
