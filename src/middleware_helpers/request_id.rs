use crate::tracing::{RequestId, REQUEST_ID_HEADER};
use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

/// Tags every request with an id: the caller's `x-request-id` when it is a
/// usable header value, a fresh UUID otherwise. The id is echoed on the
/// response and scoped for error bodies.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let (request_id, header_value) = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| {
            let id = v.to_str().ok().filter(|s| !s.trim().is_empty())?;
            Some((RequestId::new(id), v.clone()))
        })
        .unwrap_or_else(fresh_request_id);

    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
    request
        .headers_mut()
        .insert(header_name.clone(), header_value.clone());
    request.extensions_mut().insert(request_id.clone());

    let span = tracing::debug_span!("request_id", request_id = %request_id);
    let mut response = crate::tracing::scope_request_id(request_id, next.run(request))
        .instrument(span)
        .await;

    response.headers_mut().insert(header_name, header_value);
    response
}

fn fresh_request_id() -> (RequestId, HeaderValue) {
    let id = RequestId::default();
    // A hyphenated UUID is always a valid header value.
    let value = HeaderValue::from_str(id.as_str()).unwrap_or(HeaderValue::from_static("unknown"));
    (id, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        extract::Extension,
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn extension_handler(
        Extension(request_id): Extension<RequestId>,
    ) -> (StatusCode, String) {
        let scoped = crate::tracing::current_request_id()
            .map(|r| r.0)
            .unwrap_or_default();
        (
            StatusCode::OK,
            format!("request-id:{}|scoped:{}", request_id.as_str(), scoped),
        )
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(extension_handler))
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    #[tokio::test]
    async fn middleware_adds_request_id_header_and_extension() {
        let response = app()
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap();
        assert!(uuid::Uuid::parse_str(&header).is_ok());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(body_str, format!("request-id:{header}|scoped:{header}"));
    }

    #[tokio::test]
    async fn caller_supplied_id_is_echoed() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "trace-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-42");
    }
}
