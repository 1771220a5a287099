// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HTTP plumbing for the Supabase adapters.
//!
//! [`SupabaseClient`] owns the connection pool, the project URL, the anon
//! key, and the current access token. The row store, the auth adapter, and
//! the realtime feed all hold clones of the same client, so a sign-in is
//! immediately visible to every request that follows it.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use ingatin_config::model::SupabaseConfig;
use ingatin_core::IngatinError;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Characters left alone in PostgREST filter values.
const FILTER_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// HTTP client shared by the Supabase adapters.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
    access_token: Arc<RwLock<Option<SecretString>>>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("anon_key", &"[REDACTED]")
            .field("signed_in", &self.has_access_token())
            .finish()
    }
}

impl SupabaseClient {
    /// Creates a client for the project at `base_url`.
    pub fn new(
        base_url: &str,
        anon_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, IngatinError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(IngatinError::Config("supabase.url is empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngatinError::Remote {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url,
            anon_key,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Creates a client from the `[supabase]` config section.
    ///
    /// Both `url` and `anon_key` must be set (in TOML or through
    /// `INGATIN_SUPABASE_URL` / `INGATIN_SUPABASE_ANON_KEY`).
    pub fn from_config(config: &SupabaseConfig) -> Result<Self, IngatinError> {
        let url = config.url.as_deref().ok_or_else(|| {
            IngatinError::Config(
                "supabase.url is not set (set it in ingatin.toml or INGATIN_SUPABASE_URL)".into(),
            )
        })?;
        let anon_key = config.anon_key.clone().ok_or_else(|| {
            IngatinError::Config(
                "supabase.anon_key is not set (set it in ingatin.toml or INGATIN_SUPABASE_ANON_KEY)"
                    .into(),
            )
        })?;
        Self::new(
            url,
            SecretString::from(anon_key),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/rest/v1/{path}`
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{path}", self.base_url)
    }

    /// `{base}/auth/v1/{path}`
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    /// Realtime socket URL with the `ws`/`wss` scheme.
    pub fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!(
            "{ws_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            encode_filter_value(self.anon_key.expose_secret())
        )
    }

    /// Installs (or clears) the token sent as `Authorization: Bearer`.
    pub fn set_access_token(&self, token: Option<SecretString>) {
        match self.access_token.write() {
            Ok(mut slot) => *slot = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Token for the `Authorization` header: the session token if signed in, else the anon key.
    pub fn bearer(&self) -> String {
        let slot = match self.access_token.read() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.as_ref()
            .map(|t| t.expose_secret().to_owned())
            .unwrap_or_else(|| self.anon_key.expose_secret().to_owned())
    }

    /// Request builder carrying the `apikey` and `Authorization` headers.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.request_with_bearer(method, url, &self.bearer())
    }

    /// Same as [`request`](Self::request) with an explicit bearer token.
    pub fn request_with_bearer(&self, method: Method, url: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
            .header("Authorization", format!("Bearer {bearer}"))
    }
}

/// Percent-encodes a value placed in a query string filter.
pub fn encode_filter_value(value: &str) -> String {
    utf8_percent_encode(value, FILTER_VALUE).to_string()
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PostgrestError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Error body returned by GoTrue. Older and newer servers use different field names.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct GoTrueError {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl GoTrueError {
    pub(crate) fn into_message(self, status: StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| format!("auth service returned {status}"))
    }
}

/// Maps a transport failure into [`IngatinError::Remote`].
pub(crate) fn transport_error(e: reqwest::Error) -> IngatinError {
    if e.is_timeout() {
        return IngatinError::Remote {
            message: "request timed out".into(),
            source: Some(Box::new(e)),
        };
    }
    IngatinError::Remote {
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Reads a failed PostgREST response into an error, keeping the backend's message.
///
/// `not_found` names the resource for single-object requests: a 406 or a
/// `PGRST116` code then becomes [`IngatinError::NotFound`].
pub(crate) async fn rest_error(response: Response, not_found: Option<(&str, &str)>) -> IngatinError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: PostgrestError = serde_json::from_str(&body).unwrap_or_default();

    if let Some((resource, id)) = not_found
        && (status == StatusCode::NOT_ACCEPTABLE || parsed.code.as_deref() == Some("PGRST116"))
    {
        return IngatinError::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        };
    }

    let message = match parsed.message {
        Some(message) => {
            let mut message = message;
            if let Some(details) = parsed.details.filter(|d| !d.is_empty()) {
                message = format!("{message} ({details})");
            }
            if let Some(hint) = parsed.hint.filter(|h| !h.is_empty()) {
                message = format!("{message}; hint: {hint}");
            }
            message
        }
        None if body.is_empty() => format!("backend returned {status}"),
        None => format!("backend returned {status}: {body}"),
    };
    IngatinError::remote(message)
}

/// Parses a successful response body as JSON.
pub(crate) async fn json_body<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, IngatinError> {
    let body = response.text().await.map_err(|e| IngatinError::Remote {
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| IngatinError::Remote {
        message: format!("failed to parse backend response: {e}"),
        source: Some(Box::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> SupabaseClient {
        SupabaseClient::new(url, SecretString::from("anon-key"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn urls_are_built_from_base() {
        let c = client("https://abcd.supabase.co/");
        assert_eq!(c.rest_url("users"), "https://abcd.supabase.co/rest/v1/users");
        assert_eq!(
            c.auth_url("token?grant_type=password"),
            "https://abcd.supabase.co/auth/v1/token?grant_type=password"
        );
        assert_eq!(
            c.realtime_url(),
            "wss://abcd.supabase.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
    }

    #[test]
    fn plain_http_maps_to_ws() {
        let c = client("http://127.0.0.1:54321");
        assert!(c.realtime_url().starts_with("ws://127.0.0.1:54321/realtime/v1/websocket"));
    }

    #[test]
    fn bearer_falls_back_to_anon_key() {
        let c = client("http://localhost");
        assert_eq!(c.bearer(), "anon-key");
        assert!(!c.has_access_token());

        let shared = c.clone();
        c.set_access_token(Some(SecretString::from("jwt")));
        assert_eq!(shared.bearer(), "jwt");

        shared.set_access_token(None);
        assert_eq!(c.bearer(), "anon-key");
    }

    #[test]
    fn debug_redacts_anon_key() {
        let c = client("http://localhost");
        let debug = format!("{c:?}");
        assert!(!debug.contains("anon-key"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn from_config_requires_url_and_key() {
        let mut config = SupabaseConfig::default();
        assert!(matches!(
            SupabaseClient::from_config(&config),
            Err(IngatinError::Config(_))
        ));
        config.url = Some("https://abcd.supabase.co".into());
        assert!(matches!(
            SupabaseClient::from_config(&config),
            Err(IngatinError::Config(msg)) if msg.contains("anon_key")
        ));
        config.anon_key = Some("k".into());
        assert!(SupabaseClient::from_config(&config).is_ok());
    }

    #[test]
    fn filter_values_are_encoded() {
        assert_eq!(encode_filter_value("a b&c"), "a%20b%26c");
        assert_eq!(
            encode_filter_value("0b6c-41e2_x.y"),
            "0b6c-41e2_x.y"
        );
    }

    #[test]
    fn gotrue_error_prefers_description() {
        let err = GoTrueError {
            error: Some("invalid_grant".into()),
            error_description: Some("Invalid login credentials".into()),
            ..Default::default()
        };
        assert_eq!(
            err.into_message(StatusCode::BAD_REQUEST),
            "Invalid login credentials"
        );
    }
}
