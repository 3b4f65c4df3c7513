//! Request authentication.
//!
//! Two methods are supported, basic auth against a static user list, or a
//! trusted header set by a reverse proxy. The middleware stores the
//! resulting [`AuthUser`] in request extensions for handlers to read.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use karma_models::regex_util::compile_anchored;
use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// The authenticated user of a request. Empty when authentication is off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthUser {
    /// User name.
    pub username: String,
    /// Groups from `authorization.groups` and the group header.
    pub groups: Vec<String>,
}

/// Compiled header authentication settings.
#[derive(Debug, Clone)]
pub struct HeaderAuth {
    name: String,
    value_re: Regex,
    group_name: String,
    group_re: Option<Regex>,
    separator: String,
}

/// Configured authentication method.
#[derive(Debug, Clone)]
pub enum Authenticator {
    /// Every request is anonymous.
    Disabled,
    /// Basic auth, user name to password.
    Basic(HashMap<String, String>),
    /// Trusted headers.
    Header(Box<HeaderAuth>),
}

fn auth_error(reason: impl Into<String>) -> ServerError {
    ServerError::Config { reason: reason.into() }
}

impl Authenticator {
    /// Builds the authenticator from `authentication`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let auth = &config.authentication;
        let basic = !auth.basic_auth.users.is_empty();
        let header = !auth.header.name.is_empty();

        match (basic, header) {
            (true, true) => Err(auth_error(
                "authentication.basicAuth and authentication.header can't be used together",
            )),
            (true, false) => {
                let mut users = HashMap::new();
                for user in &auth.basic_auth.users {
                    if user.username.is_empty() || user.password.is_empty() {
                        return Err(auth_error("basicAuth users need both a username and a password"));
                    }
                    users.insert(user.username.clone(), user.password.clone());
                }
                Ok(Self::Basic(users))
            }
            (false, true) => {
                let h = &auth.header;
                if h.value_regex.is_empty() {
                    return Err(auth_error("authentication.header.valueRegex is required"));
                }
                let value_re = compile_anchored(&h.value_regex)
                    .map_err(|e| auth_error(format!("invalid authentication.header.valueRegex: {e}")))?;
                let group_re = if h.group_name.is_empty() {
                    None
                } else {
                    let pattern = if h.group_value_regex.is_empty() { "(.*)" } else { &h.group_value_regex };
                    Some(
                        compile_anchored(pattern)
                            .map_err(|e| auth_error(format!("invalid authentication.header.groupValueRegex: {e}")))?,
                    )
                };
                Ok(Self::Header(Box::new(HeaderAuth {
                    name: h.name.clone(),
                    value_re,
                    group_name: h.group_name.clone(),
                    group_re,
                    separator: if h.group_value_separator.is_empty() {
                        " ".to_string()
                    } else {
                        h.group_value_separator.clone()
                    },
                })))
            }
            (false, false) => Ok(Self::Disabled),
        }
    }

    /// Whether requests must be authenticated.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Resolves the user name and header groups of a request.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Option<(String, Vec<String>)>> {
        match self {
            Self::Disabled => Ok(None),
            Self::Basic(users) => {
                let (username, password) = basic_credentials(headers).ok_or(ServerError::Unauthorized { basic: true })?;
                match users.get(&username) {
                    Some(expected) if *expected == password => Ok(Some((username, Vec::new()))),
                    _ => Err(ServerError::Unauthorized { basic: true }),
                }
            }
            Self::Header(h) => {
                let value = header_value(headers, &h.name);
                if value.is_empty() {
                    return Err(ServerError::Unauthorized { basic: false });
                }
                let username = h
                    .value_re
                    .captures(value)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .filter(|u| !u.is_empty())
                    .ok_or(ServerError::Unauthorized { basic: false })?;

                let groups = match &h.group_re {
                    Some(re) => re
                        .captures(header_value(headers, &h.group_name))
                        .and_then(|c| c.get(1))
                        .map(|m| {
                            m.as_str()
                                .split(h.separator.as_str())
                                .map(str::trim)
                                .filter(|g| !g.is_empty())
                                .map(String::from)
                                .collect()
                        })
                        .unwrap_or_default(),
                    None => Vec::new(),
                };
                Ok(Some((username, groups)))
            }
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Middleware authenticating every request it wraps.
pub async fn authenticate(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let user = match state.auth.authenticate(req.headers()) {
        Ok(Some((username, header_groups))) => {
            let mut groups = state.config.user_groups(&username);
            for group in header_groups {
                if !groups.contains(&group) {
                    groups.push(group);
                }
            }
            debug!(username = %username, groups = ?groups, "Authenticated request");
            AuthUser { username, groups }
        }
        Ok(None) => AuthUser::default(),
        Err(e) => {
            debug!(path = %req.uri().path(), "Rejected unauthenticated request");
            return e.into_response();
        }
    };
    req.extensions_mut().insert(user);
    next.run(req).await
}
