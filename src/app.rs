use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::{
    classify::ServerErrorsFailureClass,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{Span, info_span};

use crate::pipeline::ImagePicker;
use crate::routes::best_image;

#[derive(Clone)]
pub struct AppState {
    pub picker: Arc<ImagePicker>,
}

impl AppState {
    #[must_use]
    pub fn new(picker: ImagePicker) -> Self {
        Self {
            picker: Arc::new(picker),
        }
    }
}

async fn healthz() -> Json<&'static str> {
    Json("ok")
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_app(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            let rid = req
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            info_span!("http", method = %req.method(), uri = %req.uri(), request_id = %rid)
        })
        .on_request(|_req: &Request<Body>, _span: &Span| {
            tracing::debug!("request started");
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &Span| {
            tracing::info!(
                status = %res.status(),
                latency_ms = %latency.as_millis(),
                "response completed"
            );
        })
        .on_failure(|_class: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
            tracing::error!(latency_ms = %latency.as_millis(), "request failed");
        });

    // Request-ID first so the trace span can read x-request-id.
    let request_id_layer = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id());

    Router::new()
        .route("/healthz", get(healthz))
        .route("/best-image", get(best_image::get))
        .with_state(state)
        .layer(trace)
        .layer(request_id_layer)
        .layer(cors_layer())
}
