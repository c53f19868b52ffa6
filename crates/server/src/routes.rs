//! HTTP surface
//!
//! `GET /render?url=<target>` and `GET /<target>` both render; the path form
//! takes everything after the first `/`, query string included.

use axum::{
    extract::{Query, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use prerender::{PageProvider, RenderPipeline, RenderRequest, RenderResult};

#[derive(Debug, Deserialize)]
pub struct RenderQuery {
    pub url: String,
}

pub fn router<P>(pipeline: Arc<RenderPipeline<P>>) -> Router
where
    P: PageProvider + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/render", get(render_query::<P>))
        .fallback(render_path::<P>)
        .with_state(pipeline)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn render_query<P: PageProvider + 'static>(
    State(pipeline): State<Arc<RenderPipeline<P>>>,
    Query(query): Query<RenderQuery>,
    headers: HeaderMap,
) -> Response {
    let request = RenderRequest::new(query.url, caller_headers(&headers));
    RenderResponse(pipeline.execute(&request).await).into_response()
}

async fn render_path<P: PageProvider + 'static>(
    State(pipeline): State<Arc<RenderPipeline<P>>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let request = RenderRequest::from_path(path, caller_headers(&headers));
    RenderResponse(pipeline.execute(&request).await).into_response()
}

/// Header names arrive lower-cased; values that are not valid UTF-8 are dropped
pub fn caller_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

pub struct RenderResponse(pub RenderResult);

impl IntoResponse for RenderResponse {
    fn into_response(self) -> Response {
        let (status, headers, body) = match self.0 {
            RenderResult::InlineHtml { status, headers, body } => (status, headers, body),
            RenderResult::Redirect { status, headers } => (status, headers, String::new()),
            RenderResult::Error { status, body } => (status, Default::default(), body),
        };

        let mut response = body.into_response();
        *response.status_mut() =
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => tracing::warn!("Dropping invalid response header {}", name),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use browser::{BrowserConfig, BrowserPool};
    use prerender::{HttpObjectStore, RenderConfig};
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<BrowserPool>) {
        let config = RenderConfig::default();
        let pool = Arc::new(BrowserPool::new(BrowserConfig::default()));
        let storage = Arc::new(HttpObjectStore::new(config.storage.clone()).unwrap());
        let pipeline = RenderPipeline::new(pool.clone(), storage, config).unwrap();
        (router(Arc::new(pipeline)), pool)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn foreign_targets_are_rejected_in_both_forms() {
        let (app, pool) = app();

        for uri in [
            "/render?url=https%3A%2F%2Fnotallowed.com%2Fpage",
            "/https://notallowed.com/page",
        ] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_text(response).await, "Only CBD domain urls can be rendered");
        }

        assert!(!pool.is_initialized().await);
    }

    #[test]
    fn redirect_result_becomes_302_with_location() {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Location".to_string(),
            "https://s3.amazonaws.com/pdf-cache-prod/html-files/a.html".to_string(),
        );
        headers.insert("Cache-Control".to_string(), "public, max-age=604800".to_string());

        let response = RenderResponse(RenderResult::Redirect {
            status: 302,
            headers,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()["location"],
            "https://s3.amazonaws.com/pdf-cache-prod/html-files/a.html"
        );
        assert_eq!(response.headers()["cache-control"], "public, max-age=604800");
    }

    #[test]
    fn inline_result_keeps_html_content_type() {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "text/html".to_string());

        let response = RenderResponse(RenderResult::InlineHtml {
            status: 200,
            headers,
            body: "<html></html>".to_string(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/html");
    }

    #[test]
    fn caller_headers_are_lower_cased() {
        let mut map = HeaderMap::new();
        map.insert("X-Origin-User-Agent", HeaderValue::from_static("Googlebot"));
        let headers = caller_headers(&map);
        assert_eq!(headers.get("x-origin-user-agent").map(String::as_str), Some("Googlebot"));
    }
}
