//! Upstream transport.
//!
//! # Responsibilities
//! - Send the rewritten draft upstream with reqwest
//! - Stream request and response bodies without buffering
//! - Map transport failures to 502 and timeouts to 504
//!
//! # Design Decisions
//! - Redirects are returned to the client, never followed
//! - Environment proxies are ignored; targets are reached directly

use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;

use crate::rewrite::headers::strip_hop_by_hop;
use crate::routing::view::OutboundDraft;

/// Client shared by every route.
pub fn build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .no_proxy()
        .build()
}

/// Whether the inbound request declared a body.
pub fn has_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(header::TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|len| len > 0)
}

/// Send `draft` upstream and relay the response.
pub async fn forward(
    client: &reqwest::Client,
    draft: OutboundDraft,
    body: Body,
    has_body: bool,
) -> Response {
    let Some(url) = draft.url() else {
        tracing::error!("Draft has no upstream target");
        return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
    };

    let OutboundDraft {
        method, headers, ..
    } = draft;
    let mut request = client.request(method, url.clone()).headers(headers);
    if has_body {
        request = request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    match request.send().await {
        Ok(upstream) => {
            let status = upstream.status();
            let mut headers = upstream.headers().clone();
            strip_hop_by_hop(&mut headers);

            let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(e) if e.is_timeout() => {
            tracing::warn!(upstream = %url, error = %e, "Upstream request timed out");
            (StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out").into_response()
        }
        Err(e) => {
            tracing::error!(upstream = %url, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
