//! Interceptors and the presets that stack them.
//!
//! Layers are listed outermost first. A preset is applied to a route group
//! with [`public`] or [`private`]; the service-key gate is applied once to
//! the whole `/api/v1` group with [`protected`].

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use std::time::Instant;

use axum::{
    Router,
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::{self, Next},
    response::Response,
};
use futures::FutureExt;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any as AnyOrigin, CorsLayer},
};
use tracing::Instrument;

use super::jwt::{JwtService, jwt_middleware};
use super::rate_limit::{RateLimiterState, client_ip, rate_limit_middleware};
use super::respond::failure;
use super::service_key::{SERVICE_KEY_HEADER, ServiceKeyGate, service_key_middleware};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

const PANIC_MESSAGE: &str = "A serious error occurred. Please contact support.";

/// The identifier of the request being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Returns the id already attached to `request`, attaching one first if
    /// needed: the inbound `X-Request-ID` when present, else a fresh UUID v4.
    pub fn ensure(request: &mut Request<Body>) -> RequestId {
        if let Some(id) = request.extensions().get::<RequestId>() {
            return id.clone();
        }

        let id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let id = RequestId(id);
        request.extensions_mut().insert(id.clone());
        id
    }

    fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }
}

// ---------------------------------------------------------------------------
// Recover
// ---------------------------------------------------------------------------

thread_local! {
    static LAST_PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chains a hook that keeps the backtrace of the latest panic on the
/// panicking thread so [`recover_middleware`] can log it.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            LAST_PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Turns a panic anywhere inside into a generic 500 envelope.
pub async fn recover_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = RequestId::ensure(&mut request);
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let backtrace = LAST_PANIC_BACKTRACE
                .with(|slot| slot.borrow_mut().take())
                .unwrap_or_else(|| Backtrace::force_capture().to_string());
            tracing::error!(
                request_id = %request_id.0,
                %method,
                %path,
                panic = %panic_message(payload.as_ref()),
                %backtrace,
                "panic_recovered"
            );

            let mut response = failure(StatusCode::INTERNAL_SERVER_ERROR, PANIC_MESSAGE, "INTERNAL_ERROR");
            if let Some(value) = request_id.header_value() {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            response
        }
    }
}

// ---------------------------------------------------------------------------
// Headers, identity, CORS
// ---------------------------------------------------------------------------

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

/// Attaches the request id, echoes it on the response and opens a span
/// carrying it for everything logged further in.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = RequestId::ensure(&mut request);
    let span = tracing::info_span!("request", request_id = %request_id.0);

    let mut response = next.run(request).instrument(span).await;
    if let Some(value) = request_id.header_value() {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(SERVICE_KEY_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(RESPONSE_TIME_HEADER),
        ])
}

// ---------------------------------------------------------------------------
// Timing and access logs
// ---------------------------------------------------------------------------

pub async fn timer_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let mut response = next.run(request).await;

    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    if let Ok(value) = HeaderValue::from_str(&format!("{duration_ms:.3}ms")) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }
    tracing::info!(%method, %path, duration_ms, "request_duration");
    response
}

pub async fn logger_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let remote = client_ip(&request);

    tracing::info!(%request_id, %method, %path, %remote, "incoming_request");

    let response = next.run(request).await;

    tracing::debug!(
        %request_id,
        %method,
        %path,
        status = response.status().as_u16(),
        duration = ?start.elapsed(),
        "request_completed"
    );
    response
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// recover, compression, security headers, request id, CORS, rate limit,
/// timer, logger.
pub fn public<S>(router: Router<S>, limiter: Arc<RateLimiterState>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(recover_middleware))
            .layer(CompressionLayer::new())
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(cors_layer())
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
            .layer(middleware::from_fn(timer_middleware))
            .layer(middleware::from_fn(logger_middleware)),
    )
}

/// The public stack with the JWT gate between CORS and the rate limiter.
pub fn private<S>(router: Router<S>, limiter: Arc<RateLimiterState>, jwt: Arc<JwtService>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(recover_middleware))
            .layer(CompressionLayer::new())
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(cors_layer())
            .layer(middleware::from_fn_with_state(jwt, jwt_middleware))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
            .layer(middleware::from_fn(timer_middleware))
            .layer(middleware::from_fn(logger_middleware)),
    )
}

/// The service-key gate alone.
pub fn protected<S>(router: Router<S>, gate: Arc<ServiceKeyGate>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(gate, service_key_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::routing::get;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::inbound::respond::Success;

    fn app() -> Router {
        install_panic_hook();
        let limiter = Arc::new(RateLimiterState::new(2, Duration::from_secs(60)));
        public(
            Router::new()
                .route("/ok", get(|| async { Success::message("fine") }))
                .route(
                    "/boom",
                    get(|| async {
                        if true {
                            panic!("handler exploded");
                        }
                        Success::message("unreachable")
                    }),
                ),
            limiter,
        )
    }

    #[tokio::test]
    async fn test_public_preset_decorates_response() {
        let response = app()
            .oneshot(
                Request::get("/ok")
                    .header(REQUEST_ID_HEADER, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[REQUEST_ID_HEADER], "req-123");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
        assert!(headers.contains_key(RESPONSE_TIME_HEADER));
    }

    #[tokio::test]
    async fn test_request_id_generated_when_absent() {
        let response = app()
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_panic_becomes_500_envelope() {
        let response = app()
            .oneshot(
                Request::get("/boom")
                    .header(REQUEST_ID_HEADER, "panic-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "panic-1");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["s"], 0);
        assert_eq!(body["m"], PANIC_MESSAGE);
        assert_eq!(body["c"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_rate_limit_inside_preset() {
        let app = app();
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/ok")
                    .header(header::ORIGIN, "https://example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
