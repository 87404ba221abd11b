//! Structured JSON event logging with a synchronous stdout sink and an
//! optional fire-and-forget remote sink (spec §4.10).

mod sink;

pub use sink::{HttpLogSink, LogSink};

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Severe,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Severe => "SEVERE",
        }
    }
}

/// One emitted line; kept around so a remote sink can batch several events.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    pub session_id: Option<String>,
}

impl LogEvent {
    /// `{level, message, session_id, origin:"sdk_destination"}`, quote and
    /// backslash escaped (spec §4.10). Hand-rolled rather than via
    /// `serde_json` so the escaping matches exactly what the wire format
    /// has always emitted — one quote, one backslash, nothing fancier.
    pub fn to_json_line(&self) -> String {
        let mut out = String::with_capacity(self.message.len() + 64);
        out.push_str("{\"level\":\"");
        escape_into(&mut out, self.level.as_str());
        out.push_str("\",\"message\":\"");
        escape_into(&mut out, &self.message);
        out.push_str("\",\"session_id\":");
        match &self.session_id {
            Some(id) => {
                out.push('"');
                escape_into(&mut out, id);
                out.push('"');
            }
            None => out.push_str("null"),
        }
        out.push_str(",\"origin\":\"sdk_destination\"}");
        out
    }
}

fn escape_into(out: &mut String, input: &str) {
    for c in input.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
}

/// Per-request logger (spec §4.8, §4.10): owned by `RequestContext`, shares
/// the remote sink by `Arc` across requests.
#[derive(Clone)]
pub struct Logger {
    session_id: Option<String>,
    remote_sink: Option<Arc<dyn LogSink>>,
}

impl Logger {
    pub fn new(session_id: Option<String>) -> Self {
        Self {
            session_id,
            remote_sink: None,
        }
    }

    pub fn with_remote_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.remote_sink = Some(sink);
        self
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message.into());
    }

    pub fn severe(&self, message: impl Into<String>) {
        self.log(LogLevel::Severe, message.into());
    }

    fn log(&self, level: LogLevel, message: String) {
        let event = LogEvent {
            level,
            message,
            session_id: self.session_id.clone(),
        };

        println!("{}", event.to_json_line());

        if let Some(sink) = self.remote_sink.clone() {
            tokio::spawn(async move {
                if let Err(err) = sink.send_batch(&[event]).await {
                    tracing::warn!(error = %err, "remote log sink delivery failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_line_escapes_quotes_and_backslashes() {
        let event = LogEvent {
            level: LogLevel::Info,
            message: "path is \"C:\\data\"".to_string(),
            session_id: Some("sess-1".to_string()),
        };
        let line = event.to_json_line();
        assert!(line.contains("path is \\\"C:\\\\data\\\""));
        assert!(line.starts_with("{\"level\":\"INFO\""));
        assert!(line.contains("\"origin\":\"sdk_destination\""));
    }

    #[test]
    fn json_line_renders_null_session_id() {
        let event = LogEvent {
            level: LogLevel::Severe,
            message: "boom".to_string(),
            session_id: None,
        };
        assert!(event.to_json_line().contains("\"session_id\":null"));
    }
}
