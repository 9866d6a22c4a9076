//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routes:
//!
//! - `GET /health`: liveness
//! - `POST /rpc/recordActivity`: callable-style RPC, body `{"data": {...}}`,
//!   caller identified by a Bearer JWT

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::auth::JwtValidator;
use crate::rpc::{ActivityRecorder, RecordActivityRequest, RpcError};
use crate::types::Result;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared server state
pub struct AppState {
    pub recorder: ActivityRecorder,
    pub jwt: JwtValidator,
    pub dev_mode: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(recorder: ActivityRecorder, jwt: JwtValidator, dev_mode: bool) -> Self {
        Self {
            recorder,
            jwt,
            dev_mode,
            started_at: Instant::now(),
        }
    }
}

/// Callable request envelope
#[derive(Debug, Deserialize)]
struct CallEnvelope<T: Default> {
    #[serde(default)]
    data: T,
}

/// Run the HTTP server until shutdown
pub async fn run(
    listen: SocketAddr,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!("Hearth RPC listening on {}", listen);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("HTTP server shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);

                            let service = service_fn(move |req| {
                                let state = Arc::clone(&state);
                                async move { handle_request(state, addr, req).await }
                            });

                            if let Err(err) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!("Error serving connection from {}: {:?}", addr, err);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("[{}] {} {}", addr, method, path);

    let response = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => preflight_response(),
        (&Method::GET, "/health") => json_response(StatusCode::OK, &health_body(&state)),
        (&Method::POST, "/rpc/recordActivity") => {
            let auth_header = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(String::from);

            let body = match req.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!("Request body error: {}", e);
                    Bytes::new()
                }
            };

            let (status, body) = record_activity(&state, auth_header.as_deref(), &body).await;
            json_response(status, &body)
        }
        _ => json_response(
            StatusCode::NOT_FOUND,
            &json!({"error": "Not Found", "path": path}),
        ),
    };

    Ok(response)
}

fn health_body(state: &AppState) -> JsonValue {
    json!({
        "status": "ok",
        "service": "hearth",
        "version": env!("CARGO_PKG_VERSION"),
        "devMode": state.dev_mode,
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    })
}

/// `recordActivity` over HTTP, returning status and JSON body
pub async fn record_activity(
    state: &AppState,
    auth_header: Option<&str>,
    body: &[u8],
) -> (StatusCode, JsonValue) {
    let Some(caller) = state.jwt.resolve_caller(auth_header) else {
        let err = RpcError::unauthenticated();
        return (err.http_status(), err.to_json());
    };

    let request = match serde_json::from_slice::<CallEnvelope<RecordActivityRequest>>(body) {
        Ok(envelope) => envelope.data,
        Err(e) => {
            warn!(user_id = %caller.uid, "Unreadable recordActivity body: {}", e);
            let err = RpcError::Internal("Failed to record activity".into());
            return (err.http_status(), err.to_json());
        }
    };

    match state
        .recorder
        .record_activity(Some(&caller), request, Utc::now())
        .await
    {
        Ok(response) => (StatusCode::OK, json!({ "result": response })),
        Err(err) => (err.http_status(), err.to_json()),
    }
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

fn json_response(status: StatusCode, body: &JsonValue) -> Response<BoxBody> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    to_boxed(response)
}

/// CORS preflight response
fn preflight_response() -> Response<BoxBody> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    to_boxed(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocPath, DocumentStore, MemoryStore};

    async fn state_with_user() -> (Arc<MemoryStore>, AppState) {
        let store = Arc::new(MemoryStore::new());
        store.seed(&DocPath::new("users", "u1"), json!({})).await;
        let state = AppState::new(
            ActivityRecorder::new(store.clone()),
            JwtValidator::new_dev(),
            true,
        );
        (store, state)
    }

    #[tokio::test]
    async fn test_record_activity_success() {
        let (store, state) = state_with_user().await;
        let token = state.jwt.generate_token("u1").unwrap();
        let header = format!("Bearer {}", token);

        let (status, body) = record_activity(
            &state,
            Some(&header),
            br#"{"data": {"action": "viewed_devotion", "metadata": {"devotionId": "d1"}}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": {"success": true}}));
        assert_eq!(store.document_count("userActivity/u1/activities").await, 1);
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_is_unauthenticated() {
        let (store, state) = state_with_user().await;
        let writes_before = store.write_count();
        let body = br#"{"data": {"action": "viewed_devotion"}}"#;

        for header in [None, Some("Bearer not-a-jwt")] {
            let (status, json) = record_activity(&state, header, body).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(json["error"]["status"], "UNAUTHENTICATED");
        }
        assert_eq!(store.write_count(), writes_before);
        assert!(store
            .query("userActivity/u1/activities", &crate::db::Query::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_caller_checked_before_body() {
        let (store, state) = state_with_user().await;
        let bodies: [&[u8]; 3] = [br#"{"data": {}}"#, b"not json", br#"{"data": {"metadata": [1, 2]}}"#];
        for body in bodies {
            let (status, json) = record_activity(&state, None, body).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(json["error"]["status"], "UNAUTHENTICATED");
        }
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_data_is_recorded() {
        let (store, state) = state_with_user().await;
        let header = format!("Bearer {}", state.jwt.generate_token("u1").unwrap());

        let (status, body) = record_activity(&state, Some(&header), br#"{"data": {}}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": {"success": true}}));
        assert_eq!(store.document_count("userActivity/u1/activities").await, 1);
    }

    #[tokio::test]
    async fn test_unreadable_body_is_internal() {
        let (store, state) = state_with_user().await;
        let header = format!("Bearer {}", state.jwt.generate_token("u1").unwrap());

        let bodies: [&[u8]; 2] = [b"not json", br#"{"data": {"action": "a", "metadata": [1, 2]}}"#];
        for body in bodies {
            let (status, json) = record_activity(&state, Some(&header), body).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json["error"]["status"], "INTERNAL");
        }
        assert_eq!(store.document_count("userActivity/u1/activities").await, 0);
    }

    #[test]
    fn test_health_body() {
        let state = AppState::new(
            ActivityRecorder::new(Arc::new(MemoryStore::new())),
            JwtValidator::new_dev(),
            false,
        );
        let body = health_body(&state);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["devMode"], false);
    }
}
