use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http_body::{Body as HttpBody, Frame, SizeHint};
use tracing::{debug, warn};

use crate::metrics::{CounterSet, HttpVerb, LatencyKind};

/// Counts every request by verb and adds its wall time to the service
/// latency total.
///
/// The verb is counted before the handler runs. Latency is recorded once
/// the response body has been fully handed to the connection (or dropped),
/// not when the handler returns. Requests are never rejected or altered.
pub async fn track_requests(
    State(counters): State<Arc<CounterSet>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match HttpVerb::classify(&method) {
        Ok(verb) => counters.increment_method(verb),
        Err(e) => warn!(error = %e, %path, "request not counted"),
    }

    let response = next.run(req).await;

    debug!(
        %method,
        %path,
        status = response.status().as_u16(),
        handler_us = start.elapsed().as_micros() as u64,
        "request handled"
    );

    let guard = LatencyGuard { counters, start };
    response.map(move |inner| Body::new(TrackedBody { inner, _guard: guard }))
}

/// Response body that carries a [`LatencyGuard`]. Frames, size hint and
/// end-of-stream are passed through untouched, so framing headers such as
/// `Content-Length` survive.
struct TrackedBody {
    inner: Body,
    _guard: LatencyGuard,
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Rides along with the response body; records latency when dropped.
struct LatencyGuard {
    counters: Arc<CounterSet>,
    start: Instant,
}

impl Drop for LatencyGuard {
    fn drop(&mut self) {
        let millis = self.start.elapsed().as_millis() as u64;
        self.counters.record_latency(LatencyKind::Service, millis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::to_bytes,
        http::{Method, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(counters: Arc<CounterSet>) -> Router {
        Router::new()
            .route(
                "/echo",
                get(|| async { "get" })
                    .post(|| async { "post" })
                    .put(|| async { "put" })
                    .delete(|| async { "delete" })
                    .patch(|| async { "patch" }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(25)).await;
                    "done"
                }),
            )
            .route("/hello", get(|| async { "hello" }))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(from_fn_with_state(counters, track_requests))
    }

    fn request(method: Method, uri: &str) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn counts_each_tracked_verb() {
        let counters = Arc::new(CounterSet::new());
        let app = app(counters.clone());

        for method in [Method::GET, Method::GET, Method::POST, Method::PUT, Method::DELETE] {
            let res = app.clone().oneshot(request(method, "/echo")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let snap = counters.snapshot();
        assert_eq!(snap.requests.get, 2);
        assert_eq!(snap.requests.post, 1);
        assert_eq!(snap.requests.put, 1);
        assert_eq!(snap.requests.delete, 1);
    }

    #[tokio::test]
    async fn unrecognized_verb_passes_through_uncounted() {
        let counters = Arc::new(CounterSet::new());
        let res = app(counters.clone())
            .oneshot(request(Method::PATCH, "/echo"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"patch");
        assert_eq!(counters.snapshot().requests.total(), 0);
    }

    #[tokio::test]
    async fn unknown_routes_are_still_counted() {
        let counters = Arc::new(CounterSet::new());
        let res = app(counters.clone())
            .oneshot(request(Method::GET, "/nowhere"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(counters.snapshot().requests.get, 1);
    }

    #[tokio::test]
    async fn latency_is_recorded_once_the_body_is_sent() {
        let counters = Arc::new(CounterSet::new());
        let res = app(counters.clone())
            .oneshot(request(Method::GET, "/slow"))
            .await
            .unwrap();

        // handler has returned but the body is still pending
        assert_eq!(counters.snapshot().latency.service_millis, 0);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"done");
        assert!(counters.snapshot().latency.service_millis >= 25);
    }

    #[tokio::test]
    async fn latency_is_a_running_sum() {
        let counters = Arc::new(CounterSet::new());
        let app = app(counters.clone());

        for _ in 0..2 {
            let res = app.clone().oneshot(request(Method::GET, "/slow")).await.unwrap();
            to_bytes(res.into_body(), usize::MAX).await.unwrap();
        }
        assert!(counters.snapshot().latency.service_millis >= 50);
    }

    #[tokio::test]
    async fn response_size_hint_is_preserved() {
        let plain = Router::new()
            .route("/hello", get(|| async { "hello" }))
            .oneshot(request(Method::GET, "/hello"))
            .await
            .unwrap();
        let tracked = app(Arc::new(CounterSet::new()))
            .oneshot(request(Method::GET, "/hello"))
            .await
            .unwrap();

        assert_eq!(plain.body().size_hint().exact(), Some(5));
        assert_eq!(tracked.body().size_hint().exact(), Some(5));
        assert!(!tracked.body().is_end_stream());
    }

    #[tokio::test]
    async fn content_length_survives_on_the_wire() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = app(Arc::new(CounterSet::new()));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let res = reqwest::get(format!("http://{addr}/hello")).await.unwrap();
        assert_eq!(
            res.headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok()),
            Some("5")
        );
        assert!(res.headers().get(reqwest::header::TRANSFER_ENCODING).is_none());
        assert_eq!(res.text().await.unwrap(), "hello");
    }
}
