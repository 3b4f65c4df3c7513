//! Upstream URI helpers.

use url::Url;

use crate::error::{Result, UpstreamError};

/// Credentials embedded in an upstream URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// User name.
    pub username: String,
    /// Password, if one was given.
    pub password: Option<String>,
}

/// Replaces the password in `raw` with `xxx`.
///
/// Anything that isn't a URI with a password is returned unchanged.
pub fn sanitize_uri(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    if parsed.password().is_none() || parsed.set_password(Some("xxx")).is_err() {
        return raw.to_string();
    }
    let mut sanitized = parsed.to_string();
    if !raw.ends_with('/') && sanitized.ends_with('/') {
        sanitized.pop();
    }
    sanitized
}

/// Parses an upstream URI into a base URL without credentials and the
/// credentials themselves.
///
/// The base always ends with `/` so API paths can be joined onto it.
pub fn split_credentials(raw: &str) -> Result<(Url, Option<BasicAuth>)> {
    let mut base = Url::parse(raw).map_err(|e| UpstreamError::Config {
        reason: format!("invalid alertmanager uri {:?}: {e}", sanitize_uri(raw)),
    })?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(UpstreamError::Config {
            reason: format!("unsupported scheme in alertmanager uri {:?}", sanitize_uri(raw)),
        });
    }

    let auth = (!base.username().is_empty()).then(|| BasicAuth {
        username: base.username().to_string(),
        password: base.password().map(ToString::to_string),
    });
    // Both only fail for cannot-be-a-base URIs, which http(s) never are.
    let _ = base.set_username("");
    let _ = base.set_password(None);

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);
    Ok((base, auth))
}
