//! Conversions between HTTP parts and the string maps scripts operate on.

use axum::http::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

use super::error::HookError;

/// Headers that are never forwarded upstream as-is.
///
/// Auth headers are re-applied from provider credentials, connection headers
/// belong to the HTTP client, and forwarding/CDN/trace headers describe the
/// hop into this proxy rather than the hop out of it.
pub const HEADER_BLACKLIST: &[&str] = &[
    // auth
    "authorization",
    "x-api-key",
    "x-goog-api-key",
    // connection
    "host",
    "content-length",
    "transfer-encoding",
    "accept-encoding",
    // forwarding
    "x-forwarded-host",
    "x-forwarded-port",
    "x-forwarded-proto",
    "forwarded",
    "x-forwarded-for",
    "x-real-ip",
    // CDN
    "cf-connecting-ip",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "true-client-ip",
    "fastly-client-ip",
    "x-azure-clientip",
    "x-azure-fdid",
    "x-azure-ref",
    "akamai-origin-hop",
    "x-akamai-config-log-detail",
    // tracing
    "x-request-id",
    "x-correlation-id",
    "x-trace-id",
    "x-amzn-trace-id",
    "x-b3-traceid",
    "x-b3-spanid",
    "x-b3-parentspanid",
    "x-b3-sampled",
    "traceparent",
    "tracestate",
    // set per provider
    "anthropic-beta",
    "anthropic-version",
];

pub fn is_header_blacklisted(name: &str) -> bool {
    HEADER_BLACKLIST
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

fn stringify_header_value(value: &HeaderValue) -> String {
    value
        .to_str()
        .map(str::to_string)
        .unwrap_or_else(|_| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Flatten a header map into lowercase names; repeated headers are joined with `,`.
pub fn header_string_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut output: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let value = stringify_header_value(value);
        output
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    output
}

/// Drop blacklisted headers from a flattened map.
pub fn forwardable_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| !is_header_blacklisted(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Query pairs of `url`; an unparsable URL yields an empty map.
pub fn query_map_from_url(url: &str) -> HashMap<String, String> {
    let Ok(parsed) = Url::parse(url) else {
        return HashMap::new();
    };
    parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Replace the query string of `url` with `queries` (sorted by key for stable output).
pub fn apply_queries_to_url(
    url: &str,
    queries: &HashMap<String, String>,
) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(url)?;
    if queries.is_empty() {
        parsed.set_query(None);
        return Ok(parsed.to_string());
    }

    let mut pairs: Vec<(&String, &String)> = queries.iter().collect();
    pairs.sort();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(parsed.to_string())
}

/// Join a provider base URL and an endpoint path without doubling or losing `/`.
pub fn join_endpoint(api_base: &str, endpoint: &str) -> String {
    let base = api_base.trim_end_matches('/');
    if endpoint.is_empty() {
        return base.to_string();
    }
    if endpoint.starts_with('/') {
        format!("{base}{endpoint}")
    } else {
        format!("{base}/{endpoint}")
    }
}

/// Read a JSON object of string values, as supplied for dry-run headers.
pub fn string_header_map(value: &Value) -> Result<HashMap<String, String>, HookError> {
    let Value::Object(map) = value else {
        return Err(HookError::InvalidHeaders(
            "headers must be a JSON object".to_string(),
        ));
    };

    map.iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            _ => Err(HookError::InvalidHeaders(format!(
                "header \"{key}\" must be a string"
            ))),
        })
        .collect()
}
