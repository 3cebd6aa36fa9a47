//! Authenticated request construction: URL composition, query encoding, headers.

use pm_types::ApiError;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use std::collections::BTreeMap;

/// Where requests go and how they authenticate.
#[derive(Clone)]
pub(crate) struct Endpoint {
    base: Url,
    team: Option<String>,
    api_token: String,
}

impl Endpoint {
    /// Fails with `EmptyCredential` for a blank token and `InvalidEndpoint` for a non-http(s) base.
    pub(crate) fn new(base: &str, api_token: &str, team: Option<&str>) -> Result<Self, ApiError> {
        let api_token = api_token.trim();
        if api_token.is_empty() {
            return Err(ApiError::EmptyCredential);
        }
        let mut base = Url::parse(base.trim())
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", base, e)))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ApiError::InvalidEndpoint(format!(
                "{}: expected an absolute http(s) url",
                base
            )));
        }
        base.set_query(None);
        base.set_fragment(None);
        let team = team
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);
        Ok(Self {
            base,
            team,
            api_token: api_token.to_string(),
        })
    }

    pub(crate) fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    /// `<base>[/teams/<slug>]/<segments...>?<query>` with keys in lexicographic order.
    ///
    /// Segments are percent-encoded individually; empty, `.` and `..` segments are dropped.
    /// Query parameters with an empty value are left out.
    pub(crate) fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            if let Some(team) = &self.team {
                path.push("teams");
                path.push(team);
            }
            for segment in segments {
                if !matches!(*segment, "" | "." | "..") {
                    path.push(segment);
                }
            }
        }

        let sorted: BTreeMap<&str, &str> = query
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        if sorted.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(sorted);
        }
        url
    }

    /// Builds a request carrying bearer auth and JSON content-type / accept headers.
    pub(crate) fn request(
        &self,
        http: &reqwest::Client,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Request, ApiError> {
        let mut builder = http
            .request(method, self.url(segments, query))
            .bearer_auth(&self.api_token)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.body(body);
        }
        builder
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("base", &self.base.as_str())
            .field("team", &self.team)
            .finish()
    }
}

pub(crate) fn dump_request(req: &reqwest::Request) {
    let body = req
        .body()
        .and_then(|b| b.as_bytes())
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();
    tracing::debug!(
        method = %req.method(),
        url = %req.url(),
        headers = %render_headers(req.headers()),
        body = %body,
        "request"
    );
}

pub(crate) fn dump_response(status: reqwest::StatusCode, headers: &HeaderMap, body: &[u8]) {
    tracing::debug!(
        status = %status,
        headers = %render_headers(headers),
        body = %String::from_utf8_lossy(body),
        "response"
    );
}

fn render_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name == AUTHORIZATION {
                "Bearer ***"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            format!("{}: {}", name, value)
        })
        .collect::<Vec<_>>()
        .join("; ")
}
