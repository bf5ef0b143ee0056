//! Client for the browser automation bridge.
//!
//! The bridge owns the browser session and performs the actual file
//! injection into the upload dialog. This client locates the active notebook
//! tab and hands it batches of files, re-injecting the page listener when the
//! bridge reports it missing.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::application::retry::{retry_with_recovery, RetryDecision, RetryPolicy};
use crate::domain::{
    AppError, DeliveryAdapter, DeliveryConfig, DeliveryFile, HandshakeFailure, Result,
    TargetLocator, TargetSurface,
};

const TARGET_PATH: &str = "/target";
const DELIVER_PATH: &str = "/deliver";
const INJECT_PATH: &str = "/inject-listener";

#[derive(Debug, Deserialize)]
struct TargetResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireFile<'a> {
    filename: &'a str,
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
struct DeliverRequest<'a> {
    target: &'a str,
    files: Vec<WireFile<'a>>,
}

#[derive(Debug, Serialize)]
struct InjectRequest<'a> {
    target: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct DeliverResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

/// Check a `/target` response against the expected host.
///
/// # Errors
/// Returns `NotFound` when no tab is open, it is on another site, or it is still loading.
pub fn parse_target_response(body: &str, target_host: &str) -> Result<TargetSurface> {
    let response: TargetResponse = serde_json::from_str(body).map_err(AppError::json_parse)?;

    let url = response
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::not_found("no active tab"))?;

    if !url.contains(target_host) {
        return Err(AppError::not_found(format!(
            "active tab is not on {target_host}"
        )));
    }

    if !response.ready {
        return Err(AppError::not_found(format!("{url} is still loading")));
    }

    Ok(TargetSurface { url })
}

/// Map a `/deliver` response to success or a typed failure.
///
/// # Errors
/// Returns a `Handshake` error for recognized retryable states, otherwise `Delivery`.
pub fn interpret_delivery(status: StatusCode, body: &str) -> Result<()> {
    let response: DeliverResponse = serde_json::from_str(body).unwrap_or_default();
    let message = response
        .error
        .clone()
        .unwrap_or_else(|| body.trim().to_string());

    match (status, response.kind.as_deref()) {
        (StatusCode::CONFLICT, _) | (_, Some("listener_absent")) => Err(AppError::handshake(
            HandshakeFailure::ListenerAbsent,
            message,
        )),
        (StatusCode::SERVICE_UNAVAILABLE, _) | (_, Some("not_ready")) => {
            Err(AppError::handshake(HandshakeFailure::NotReady, message))
        }
        (s, _) if s.is_success() && response.success => Ok(()),
        (s, _) => Err(AppError::Delivery {
            message: if message.is_empty() {
                format!("bridge answered {s}")
            } else {
                message
            },
        }),
    }
}

/// Retry classification for delivery handshakes.
#[must_use]
pub const fn classify_delivery_error(err: &AppError) -> RetryDecision {
    match err {
        AppError::Handshake {
            kind: HandshakeFailure::ListenerAbsent,
            ..
        } => RetryDecision::RecoverThenRetry,
        AppError::Handshake {
            kind: HandshakeFailure::NotReady,
            ..
        } => RetryDecision::Retry,
        _ => RetryDecision::GiveUp,
    }
}

/// Locator and delivery adapter over the bridge HTTP API.
pub struct BridgeClient {
    client: Client,
    base_url: String,
    target_host: String,
    policy: RetryPolicy,
}

impl BridgeClient {
    /// Create a client for the configured bridge.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::http("Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
            target_host: config.target_host.clone(),
            policy: RetryPolicy {
                max_attempts: config.max_attempts,
                backoff: Duration::from_millis(config.backoff_ms),
            },
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_batch(&self, request: &DeliverRequest<'_>) -> Result<()> {
        let response = self
            .client
            .post(self.url(DELIVER_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::http("Lost connection to automation bridge", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        interpret_delivery(status, &body)
    }

    async fn inject_listener(&self, target: &str) -> Result<()> {
        tracing::info!(target, "Injecting page listener");

        let response = self
            .client
            .post(self.url(INJECT_PATH))
            .json(&InjectRequest { target })
            .send()
            .await
            .map_err(|e| AppError::http("Listener injection failed", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Delivery {
                message: format!("listener injection answered {}", response.status()),
            })
        }
    }
}

#[async_trait]
impl TargetLocator for BridgeClient {
    async fn locate(&self) -> Result<TargetSurface> {
        let response = self
            .client
            .get(self.url(TARGET_PATH))
            .send()
            .await
            .map_err(|e| AppError::not_found(format!("automation bridge unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::not_found(format!(
                "automation bridge answered {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::http("Failed to read bridge response", e))?;

        parse_target_response(&body, &self.target_host)
    }
}

#[async_trait]
impl DeliveryAdapter for BridgeClient {
    async fn deliver(&self, target: &TargetSurface, batch: &[DeliveryFile]) -> Result<()> {
        let request = DeliverRequest {
            target: &target.url,
            files: batch
                .iter()
                .map(|file| WireFile {
                    filename: &file.filename,
                    mime_type: file.mime_type.as_str(),
                    data: STANDARD.encode(&file.bytes),
                })
                .collect(),
        };

        retry_with_recovery(
            self.policy,
            classify_delivery_error,
            || self.inject_listener(&target.url),
            || self.send_batch(&request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::State,
        routing::{get, post},
        Json, Router,
    };

    use crate::domain::MimeType;

    const HOST: &str = "notebooklm.google.com";
    const NOTEBOOK: &str = "https://notebooklm.google.com/notebook/abc";

    /// Local bridge answering 409 on `/deliver` until a listener is injected.
    #[derive(Default)]
    struct BridgeState {
        always_absent: bool,
        deliveries: AtomicUsize,
        injections: AtomicUsize,
        bodies: Mutex<Vec<serde_json::Value>>,
    }

    async fn deliver_route(
        State(state): State<Arc<BridgeState>>,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, &'static str) {
        state.deliveries.fetch_add(1, Ordering::SeqCst);
        state.bodies.lock().unwrap().push(body);

        if state.always_absent || state.injections.load(Ordering::SeqCst) == 0 {
            (
                StatusCode::CONFLICT,
                r#"{"success": false, "kind": "listener_absent", "error": "no receiver"}"#,
            )
        } else {
            (StatusCode::OK, r#"{"success": true}"#)
        }
    }

    async fn inject_route(State(state): State<Arc<BridgeState>>) -> StatusCode {
        state.injections.fetch_add(1, Ordering::SeqCst);
        StatusCode::OK
    }

    async fn target_route() -> &'static str {
        r#"{"url": "https://notebooklm.google.com/notebook/abc", "ready": true}"#
    }

    async fn spawn_bridge(state: Arc<BridgeState>) -> BridgeClient {
        let app = Router::new()
            .route("/target", get(target_route))
            .route("/deliver", post(deliver_route))
            .route("/inject-listener", post(inject_route))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        BridgeClient::new(&DeliveryConfig {
            bridge_url: format!("http://{addr}"),
            max_attempts: 3,
            backoff_ms: 0,
            ..Default::default()
        })
        .unwrap()
    }

    fn pdf() -> DeliveryFile {
        DeliveryFile {
            filename: "a.pdf".into(),
            mime_type: MimeType::Pdf,
            bytes: b"%PDF".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_deliver_injects_listener_once_then_succeeds() {
        let state = Arc::new(BridgeState::default());
        let client = spawn_bridge(Arc::clone(&state)).await;

        let target = client.locate().await.unwrap();
        assert_eq!(target.url, NOTEBOOK);

        client.deliver(&target, &[pdf()]).await.unwrap();

        assert_eq!(state.deliveries.load(Ordering::SeqCst), 2);
        assert_eq!(state.injections.load(Ordering::SeqCst), 1);

        let bodies = state.bodies.lock().unwrap();
        assert_eq!(bodies[1]["target"], NOTEBOOK);
        assert_eq!(bodies[1]["files"][0]["filename"], "a.pdf");
        assert_eq!(bodies[1]["files"][0]["mimeType"], "application/pdf");
        assert_eq!(bodies[1]["files"][0]["data"], "JVBERg==");
    }

    #[tokio::test]
    async fn test_deliver_gives_up_when_listener_stays_absent() {
        let state = Arc::new(BridgeState {
            always_absent: true,
            ..Default::default()
        });
        let client = spawn_bridge(Arc::clone(&state)).await;
        let target = TargetSurface {
            url: NOTEBOOK.into(),
        };

        let result = client.deliver(&target, &[pdf()]).await;

        assert!(matches!(result, Err(AppError::Transient { attempts: 3, .. })));
        assert_eq!(state.deliveries.load(Ordering::SeqCst), 3);
        assert_eq!(state.injections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_target_on_expected_host() {
        let body = r#"{"url": "https://notebooklm.google.com/notebook/abc", "ready": true}"#;
        let surface = parse_target_response(body, HOST).unwrap();
        assert_eq!(surface.destination_id(), "abc");
    }

    #[test]
    fn test_target_on_other_host_is_not_found() {
        let body = r#"{"url": "https://example.com/", "ready": true}"#;
        assert!(matches!(
            parse_target_response(body, HOST),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_target_not_ready() {
        let body = r#"{"url": "https://notebooklm.google.com/notebook/abc", "ready": false}"#;
        assert!(parse_target_response(body, HOST).is_err());
        assert!(parse_target_response(r#"{"ready": true}"#, HOST).is_err());
    }

    #[test]
    fn test_interpret_success() {
        assert!(interpret_delivery(StatusCode::OK, r#"{"success": true}"#).is_ok());
    }

    #[test]
    fn test_interpret_listener_absent() {
        let err = interpret_delivery(StatusCode::CONFLICT, "").unwrap_err();
        assert_eq!(classify_delivery_error(&err), RetryDecision::RecoverThenRetry);

        let err = interpret_delivery(
            StatusCode::OK,
            r#"{"success": false, "kind": "listener_absent", "error": "no receiver"}"#,
        )
        .unwrap_err();
        assert_eq!(classify_delivery_error(&err), RetryDecision::RecoverThenRetry);
    }

    #[test]
    fn test_interpret_not_ready() {
        let err = interpret_delivery(StatusCode::SERVICE_UNAVAILABLE, "warming up").unwrap_err();
        assert_eq!(classify_delivery_error(&err), RetryDecision::Retry);
    }

    #[test]
    fn test_interpret_rejection_gives_up() {
        let err = interpret_delivery(
            StatusCode::OK,
            r#"{"success": false, "error": "Input not found after triggering"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Input not found"));
        assert_eq!(classify_delivery_error(&err), RetryDecision::GiveUp);

        let err = interpret_delivery(StatusCode::INTERNAL_SERVER_ERROR, "").unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_wire_file_shape() {
        let file = pdf();
        let wire = WireFile {
            filename: &file.filename,
            mime_type: file.mime_type.as_str(),
            data: STANDARD.encode(&file.bytes),
        };
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["mimeType"], "application/pdf");
        assert_eq!(json["data"], "JVBERg==");
    }
}
