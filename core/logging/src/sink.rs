use crate::LogEvent;
use async_trait::async_trait;

/// The remote log-sink transport is an out-of-scope collaborator; this
/// trait is the seam the ambient logging stack plugs into, with
/// [`HttpLogSink`] as the in-scope default implementation.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn send_batch(&self, events: &[LogEvent]) -> Result<(), String>;
}

/// Posts batches as newline-delimited JSON to a configured endpoint.
/// Delivery is best-effort: the caller treats every error as
/// fire-and-forget and only logs it locally (spec §4.10, §5).
pub struct HttpLogSink {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

impl HttpLogSink {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LogSink for HttpLogSink {
    async fn send_batch(&self, events: &[LogEvent]) -> Result<(), String> {
        let body = events
            .iter()
            .map(LogEvent::to_json_line)
            .collect::<Vec<_>>()
            .join("\n");

        self.client
            .post(&self.endpoint)
            .header("x-md-token", &self.token)
            .body(body)
            .send()
            .await
            .map_err(|err| err.to_string())?
            .error_for_status()
            .map_err(|err| err.to_string())?;

        Ok(())
    }
}
