//! Analysis requests to an external inference endpoint.
//!
//! The request carries the operator's question plus the most recent log
//! entries and alerts. Any non-success (transport error, non-2xx status,
//! undecodable body) is reported uniformly as
//! [`TriageError::AnalysisFailed`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use watchpost_core::config::AnalysisConfig;
use watchpost_core::metrics as m;
use watchpost_core::query::LogQuery;
use watchpost_core::store::Datastore;
use watchpost_core::types::{AlertSeverity, LogEntry, ThreatAlert};

use crate::error::TriageError;

/// Quick queries offered next to the free-text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Anomalies,
    ThreatSummary,
    SecurityPosture,
    Recommendations,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Anomalies,
        Preset::ThreatSummary,
        Preset::SecurityPosture,
        Preset::Recommendations,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Preset::Anomalies => "Detect Anomalies",
            Preset::ThreatSummary => "Threat Summary",
            Preset::SecurityPosture => "Security Posture",
            Preset::Recommendations => "Recommendations",
        }
    }

    pub fn query(self) -> &'static str {
        match self {
            Preset::Anomalies => "Analyze recent logs for unusual patterns or anomalies",
            Preset::ThreatSummary => "Provide a summary of recent threat activity",
            Preset::SecurityPosture => "Assess current security posture based on logs",
            Preset::Recommendations => "Suggest security improvements based on log analysis",
        }
    }
}

/// Body sent to the inference endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub query: String,
    pub logs: Vec<LogEntry>,
    pub threats: Vec<ThreatAlert>,
}

impl AnalysisRequest {
    /// Builds a request from the current data, keeping the `max_logs` most
    /// recent entries and the `max_threats` most recent alerts.
    ///
    /// # Errors
    /// `Validation` when the query is empty or whitespace.
    pub fn from_snapshot(
        query: &str,
        mut logs: Vec<LogEntry>,
        mut threats: Vec<ThreatAlert>,
        max_logs: usize,
        max_threats: usize,
    ) -> Result<Self, TriageError> {
        let query = validate_query(query)?;
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(max_logs);
        threats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        threats.truncate(max_threats);
        Ok(Self {
            query: query.to_owned(),
            logs,
            threats,
        })
    }
}

fn validate_query(query: &str) -> Result<&str, TriageError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(TriageError::Validation(
            "analysis query must not be empty".to_owned(),
        ));
    }
    Ok(query)
}

/// One issue reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisIssue {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: AlertSeverity,
}

/// Response of the inference endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub issues: Vec<AnalysisIssue>,
}

/// Something that answers analysis requests.
pub trait InferenceEndpoint: Send + Sync {
    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<AnalysisResult, TriageError>> + Send;
}

/// Posts requests as JSON with a bearer key.
pub struct HttpInferenceEndpoint {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpInferenceEndpoint {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TriageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriageError::AnalysisFailed(format!("client setup failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Builds the client from `[analysis]`.
    ///
    /// # Errors
    /// `Config` when no endpoint is configured.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, TriageError> {
        if config.endpoint.trim().is_empty() {
            return Err(TriageError::Config {
                field: "analysis.endpoint".to_owned(),
                reason: "no inference endpoint configured".to_owned(),
            });
        }
        Self::new(
            config.endpoint.trim(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl InferenceEndpoint for HttpInferenceEndpoint {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, TriageError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TriageError::AnalysisFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TriageError::AnalysisFailed(format!(
                "endpoint returned {status}"
            )));
        }

        response
            .json::<AnalysisResult>()
            .await
            .map_err(|e| TriageError::AnalysisFailed(format!("undecodable response: {e}")))
    }
}

/// Gathers recent data and asks the endpoint about it.
pub struct Analyzer<S, E> {
    store: Arc<S>,
    endpoint: E,
    max_logs: usize,
    max_threats: usize,
}

impl<S: Datastore, E: InferenceEndpoint> Analyzer<S, E> {
    pub fn new(store: Arc<S>, endpoint: E, config: &AnalysisConfig) -> Self {
        Self {
            store,
            endpoint,
            max_logs: config.max_logs,
            max_threats: config.max_threats,
        }
    }

    /// Sends `query` with the most recent logs and alerts.
    ///
    /// An empty query is rejected before anything is read or sent.
    pub async fn analyze(&self, query: &str) -> Result<AnalysisResult, TriageError> {
        validate_query(query)?;

        let logs = self
            .store
            .query_logs(&LogQuery::new(self.max_logs))
            .await?;
        let threats = self.store.list_alerts(self.max_threats).await?;
        let request =
            AnalysisRequest::from_snapshot(query, logs, threats, self.max_logs, self.max_threats)?;

        let outcome = self.endpoint.analyze(&request).await;
        let result = if outcome.is_ok() { "success" } else { "failure" };
        metrics::counter!(m::ANALYSIS_REQUESTS_TOTAL, m::LABEL_RESULT => result).increment(1);

        match &outcome {
            Ok(r) => tracing::info!(
                logs = request.logs.len(),
                threats = request.threats.len(),
                insights = r.insights.len(),
                issues = r.issues.len(),
                "analysis complete"
            ),
            Err(e) => tracing::warn!(error = %e, "analysis failed"),
        }
        outcome
    }

    pub async fn analyze_preset(&self, preset: Preset) -> Result<AnalysisResult, TriageError> {
        self.analyze(preset.query()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::store::test_support::{alert_at, log_at, now};
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use watchpost_core::types::LogLevel;

    /// Records requests and answers with a fixed result.
    #[derive(Default)]
    struct MockEndpoint {
        seen: Mutex<Vec<AnalysisRequest>>,
        fail: bool,
    }

    impl InferenceEndpoint for MockEndpoint {
        async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, TriageError> {
            self.seen.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(TriageError::AnalysisFailed("endpoint returned 500".to_owned()));
            }
            Ok(AnalysisResult {
                insights: vec!["quiet week".to_owned()],
                issues: Vec::new(),
            })
        }
    }

    async fn seeded_store(logs: i64, alerts: i64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let base = now();
        let entries = (0..logs)
            .map(|i| log_at(LogLevel::Info, "app", &format!("line {i}"), base - ChronoDuration::minutes(i)))
            .collect();
        store.insert_logs(entries).await.unwrap();
        for i in 0..alerts {
            store
                .insert_alert(alert_at(AlertSeverity::Low, base - ChronoDuration::minutes(i)))
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn from_snapshot_keeps_most_recent() {
        let base = now();
        let logs: Vec<_> = (0..30)
            .map(|i| log_at(LogLevel::Info, "a", "m", base - ChronoDuration::minutes(i)))
            .rev()
            .collect();
        let threats: Vec<_> = (0..15)
            .map(|i| alert_at(AlertSeverity::Low, base - ChronoDuration::minutes(i)))
            .collect();

        let req = AnalysisRequest::from_snapshot("why?", logs, threats, 20, 10).unwrap();
        assert_eq!(req.logs.len(), 20);
        assert_eq!(req.threats.len(), 10);
        assert_eq!(req.logs[0].timestamp, base);
        assert!(req.logs.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert_eq!(req.threats[0].created_at, base);
    }

    #[test]
    fn blank_query_is_rejected() {
        let err = AnalysisRequest::from_snapshot(" \t", Vec::new(), Vec::new(), 20, 10).unwrap_err();
        assert!(matches!(err, TriageError::Validation(_)));
    }

    #[test]
    fn issue_severity_is_closed() {
        let ok: AnalysisResult = serde_json::from_str(
            r#"{"insights":["a"],"issues":[{"title":"t","description":"d","severity":"HIGH"}]}"#,
        )
        .unwrap();
        assert_eq!(ok.issues[0].severity, AlertSeverity::High);

        let bad = serde_json::from_str::<AnalysisResult>(
            r#"{"issues":[{"title":"t","severity":"URGENT"}]}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn presets_have_queries() {
        for preset in Preset::ALL {
            assert!(!preset.query().trim().is_empty());
            assert!(!preset.label().is_empty());
        }
    }

    #[tokio::test]
    async fn analyzer_sends_bounded_context() {
        let store = seeded_store(25, 12).await;
        let analyzer = Analyzer::new(store, MockEndpoint::default(), &AnalysisConfig::default());

        let result = analyzer.analyze_preset(Preset::ThreatSummary).await.unwrap();
        assert_eq!(result.insights, vec!["quiet week".to_owned()]);

        let seen = analyzer.endpoint.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].query, Preset::ThreatSummary.query());
        assert_eq!(seen[0].logs.len(), 20);
        assert_eq!(seen[0].threats.len(), 10);
    }

    #[tokio::test]
    async fn empty_query_sends_nothing() {
        let store = seeded_store(1, 0).await;
        let analyzer = Analyzer::new(store, MockEndpoint::default(), &AnalysisConfig::default());
        assert!(matches!(
            analyzer.analyze("   ").await,
            Err(TriageError::Validation(_))
        ));
        assert!(analyzer.endpoint.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn endpoint_failure_is_propagated() {
        let store = seeded_store(1, 0).await;
        let endpoint = MockEndpoint {
            fail: true,
            ..Default::default()
        };
        let analyzer = Analyzer::new(store, endpoint, &AnalysisConfig::default());
        assert!(matches!(
            analyzer.analyze("anything odd?").await,
            Err(TriageError::AnalysisFailed(_))
        ));
    }

    #[test]
    fn http_endpoint_requires_url() {
        let err = HttpInferenceEndpoint::from_config(&AnalysisConfig::default()).err();
        assert!(matches!(err, Some(TriageError::Config { .. })));
    }

    /// Serves one canned HTTP response and returns the raw request.
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/analyze", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn http_endpoint_posts_json_with_bearer_key() {
        let body = r#"{"insights":["ok"],"issues":[{"title":"t","description":"d","severity":"LOW"}]}"#;
        let response: &'static str = Box::leak(
            format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            )
            .into_boxed_str(),
        );
        let (url, server) = serve_once(response).await;

        let endpoint = HttpInferenceEndpoint::new(url, "secret", Duration::from_secs(5)).unwrap();
        let request =
            AnalysisRequest::from_snapshot("posture?", Vec::new(), Vec::new(), 20, 10).unwrap();
        let result = endpoint.analyze(&request).await.unwrap();
        assert_eq!(result.insights, vec!["ok".to_owned()]);
        assert_eq!(result.issues[0].severity, AlertSeverity::Low);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /analyze"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(raw.contains(r#""query":"posture?""#));
    }

    #[tokio::test]
    async fn http_endpoint_maps_error_status() {
        let (url, server) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let endpoint = HttpInferenceEndpoint::new(url, "", Duration::from_secs(5)).unwrap();
        let request = AnalysisRequest::from_snapshot("x", Vec::new(), Vec::new(), 20, 10).unwrap();
        let err = endpoint.analyze(&request).await.unwrap_err();
        assert!(matches!(err, TriageError::AnalysisFailed(ref m) if m.contains("500")));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn http_endpoint_maps_bad_body() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 8\r\nconnection: close\r\n\r\nnot json",
        )
        .await;
        let endpoint = HttpInferenceEndpoint::new(url, "", Duration::from_secs(5)).unwrap();
        let request = AnalysisRequest::from_snapshot("x", Vec::new(), Vec::new(), 20, 10).unwrap();
        assert!(matches!(
            endpoint.analyze(&request).await,
            Err(TriageError::AnalysisFailed(_))
        ));
        server.await.unwrap();
    }
}
