//! Route configuration.

use std::sync::Arc;

use axum::http::header::{self, HeaderValue};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth;
use crate::config::ListenCors;
use crate::handlers::{
    alert_list, alerts, autocomplete, counters, custom_css, custom_js, health, history, index, label_names,
    label_values, metrics, robots, silences, version,
};
use crate::proxy::{create_silence, delete_silence};
use crate::state::AppState;

async fn no_cache(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    response
}

/// Create the karma router.
///
/// Every path lives under `listen.prefix`. `/health`, `/metrics` and
/// `/robots.txt` skip authentication.
pub fn create_router(state: Arc<AppState>) -> Router {
    let prefix = state.config.listen.prefix.clone();
    let p = |path: &str| format!("{prefix}{path}");

    let protected = Router::new()
        .route(&p(""), get(index))
        .route(&p("alerts.json"), post(alerts))
        .route(&p("autocomplete.json"), get(autocomplete))
        .route(&p("labelNames.json"), get(label_names))
        .route(&p("labelValues.json"), get(label_values))
        .route(&p("silences.json"), get(silences))
        .route(&p("history.json"), post(history))
        .route(&p("counters.json"), get(counters))
        .route(&p("alertList.json"), get(alert_list))
        .route(&p("custom.css"), get(custom_css))
        .route(&p("custom.js"), get(custom_js))
        .route(&p("version"), get(version))
        .route(&p("proxy/alertmanager/{name}/api/v2/silences"), post(create_silence))
        .route(&p("proxy/alertmanager/{name}/api/v2/silence/{id}"), delete(delete_silence))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), auth::authenticate));

    let mut public = Router::new()
        .route(&p("health"), get(health))
        .route(&p("metrics"), get(metrics))
        .route(&p("robots.txt"), get(robots));
    if prefix != "/" {
        let target = prefix.clone();
        public = public.route(
            prefix.trim_end_matches('/'),
            get(move || {
                std::future::ready((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, target.clone())]).into_response())
            }),
        );
    }

    let mut router = protected
        .merge(public)
        .layer(middleware::map_response(no_cache))
        .with_state(Arc::clone(&state))
        .layer(build_cors_layer(&state.config.listen.cors))
        .layer(CompressionLayer::new())
        .layer(CatchPanicLayer::new());
    if state.config.log.requests {
        router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );
    }
    router
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &ListenCors) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
