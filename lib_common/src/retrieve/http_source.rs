//! # HTTP Source Client
//!
//! One bounded GET per source per cycle, built on a shared `reqwest::Client` so
//! connections are pooled across cycles. No retry layer; the poller's next tick
//! retries.
//!
//! Every outcome is folded into a `Reading`:
//! - 2xx with a body matching the source schema → `Reading::Success`
//! - non-2xx → failure carrying the status and the upstream `error` message
//! - timeout, refused connection, malformed JSON, schema mismatch → failure

use reqwest::StatusCode;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::aggregator::error::SourceError;
use crate::aggregator::poller::Fetch;
use crate::aggregator::reading::{Fields, Reading};
use crate::aggregator::source::SourceSpec;

/// Stateless HTTP fetcher for the configured sources.
#[derive(Debug, Clone)]
pub struct HttpSourceClient {
    /// Pooled client; per-request timeouts come from each `SourceSpec`.
    inner: reqwest::Client,
}

impl HttpSourceClient {
    /// Creates a client with the aggregator's user agent.
    ///
    /// # Errors
    /// Returns the `reqwest` error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .user_agent(concat!("server_aggregator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { inner })
    }

    /// Fetches and validates one source.
    pub async fn get(&self, source: &SourceSpec) -> Result<Fields, SourceError> {
        let budget = source.timeout();
        let response = self
            .inner
            .get(source.endpoint().clone())
            .timeout(budget)
            .send()
            .await
            .map_err(|e| classify(e, budget))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| classify(e, budget))?;

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                message: upstream_message(status, &body),
            });
        }

        let value: Value = serde_json::from_slice(&body).map_err(|e| SourceError::Decode(e.to_string()))?;
        source.kind().validate(value)
    }
}

impl Fetch for HttpSourceClient {
    fn fetch(&self, source: &SourceSpec) -> impl Future<Output = Reading> + Send {
        async move { Reading::from(self.get(source).await) }
    }
}

/// The bridge reports faults as `{"error": "..."}`; fall back to the status reason.
fn upstream_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unexpected status").to_string())
}

fn classify(e: reqwest::Error, budget: Duration) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(budget)
    } else if e.is_connect() {
        SourceError::Connect(e.to_string())
    } else if e.is_body() || e.is_decode() {
        SourceError::Decode(e.to_string())
    } else {
        SourceError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::source::SourceKind;
    use axum::{http::StatusCode as AxumStatus, routing::get, Json, Router};
    use serde_json::json;

    /// Serves `router` on an ephemeral local port and returns its base URL.
    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Sensor bridge with a faulty PM2.5 sensor and a healthy thermometer.
    fn bridge() -> Router {
        Router::new()
            .route(
                "/api/pm25",
                get(|| async {
                    (
                        AxumStatus::SERVICE_UNAVAILABLE,
                        Json(json!({"error": "Sensor Read Error or No Data"})),
                    )
                }),
            )
            .route(
                "/api/temp",
                get(|| async {
                    Json(json!({"sensor": "Temperature", "value": 21.37, "unit": "°C", "status": "success"}))
                }),
            )
    }

    fn spec(kind: SourceKind, base: &str, timeout_ms: u64) -> SourceSpec {
        SourceSpec::new(kind, base, Duration::from_millis(timeout_ms)).unwrap()
    }

    #[tokio::test]
    async fn test_valid_payload_is_success() {
        let base = spawn_upstream(bridge()).await;
        let client = HttpSourceClient::new().unwrap();

        let reading = client.fetch(&spec(SourceKind::Temperature, &base, 2000)).await;
        assert_eq!(reading.fields().unwrap()["value"], 21.37);
    }

    #[tokio::test]
    async fn test_sensor_fault_carries_upstream_message() {
        let base = spawn_upstream(bridge()).await;
        let client = HttpSourceClient::new().unwrap();

        let err = client.get(&spec(SourceKind::Particulate, &base, 2000)).await.unwrap_err();
        assert_eq!(
            err,
            SourceError::Status {
                status: 503,
                message: "Sensor Read Error or No Data".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bridge_failure_handled_like_sensor_fault() {
        let router = Router::new().route(
            "/api/temp",
            get(|| async {
                (
                    AxumStatus::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Sensor bridge failure"})),
                )
            }),
        );
        let base = spawn_upstream(router).await;
        let client = HttpSourceClient::new().unwrap();

        let faulty = spec(SourceKind::Temperature, &base, 2000);
        let err = client.get(&faulty).await.unwrap_err();
        assert_eq!(
            err,
            SourceError::Status {
                status: 500,
                message: "Sensor bridge failure".to_string()
            }
        );
        let reading = client.fetch(&faulty).await;
        assert_eq!(reading.error(), Some("HTTP 500: Sensor bridge failure"));
    }

    #[tokio::test]
    async fn test_missing_route_reports_status_reason() {
        let base = spawn_upstream(bridge()).await;
        let client = HttpSourceClient::new().unwrap();

        let reading = client.fetch(&spec(SourceKind::Fog, &base, 2000)).await;
        assert_eq!(reading.error(), Some("HTTP 404: Not Found"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let router = Router::new().route("/api/fog", get(|| async { "<html>camera offline</html>" }));
        let base = spawn_upstream(router).await;
        let client = HttpSourceClient::new().unwrap();

        let err = client.get(&spec(SourceKind::Fog, &base, 2000)).await.unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn test_initializing_vision_worker() {
        let router = Router::new().route(
            "/api/fog",
            get(|| async { Json(json!({"score": 0.0, "label": "Initializing...", "timestamp": 0})) }),
        );
        let base = spawn_upstream(router).await;
        let client = HttpSourceClient::new().unwrap();

        let reading = client.fetch(&spec(SourceKind::Fog, &base, 2000)).await;
        assert_eq!(reading.error(), Some("vision worker is still initializing"));
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let router = Router::new().route(
            "/api/fog",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"score": 0.3, "label": "Non-Foggy", "timestamp": "t"}))
            }),
        );
        let base = spawn_upstream(router).await;
        let client = HttpSourceClient::new().unwrap();

        let err = client.get(&spec(SourceKind::Fog, &base, 200)).await.unwrap_err();
        assert_eq!(err, SourceError::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        // Reserve a port, then free it so nothing is listening there.
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let client = HttpSourceClient::new().unwrap();

        let err = client
            .get(&spec(SourceKind::Particulate, &format!("http://127.0.0.1:{}", port), 2000))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Connect(_)), "got {:?}", err);
    }
}
