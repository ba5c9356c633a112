//! Client for the external Purple test-generation agent: implicit
//! discovery, a per-URL connection cache, and retry-with-backoff
//! invocation, grounded in `llm_orchestrator`'s `reqwest::Client`
//! construction and `Authorization: Bearer` request-building style.
//!
//! The full agent-protocol wire format is out of scope; this client
//! speaks the minimal request/response shape the evaluation pipeline
//! needs: a single message in, a single terminal task state with a
//! text artifact out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use green_core::Track;
use green_errors::PurpleAgentError;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Default per-attempt transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default maximum attempts per `generate_tests` call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Clone)]
struct AgentConnection {
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    state: String,
    #[serde(default)]
    artifacts: Vec<ResponseArtifact>,
}

#[derive(Debug, Deserialize)]
struct ResponseArtifact {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Purple agent, caching one connection per base URL.
pub struct PurpleAgentClient {
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    connections: Arc<Mutex<HashMap<String, AgentConnection>>>,
}

impl Default for PurpleAgentClient {
    fn default() -> Self {
        Self::new("http://localhost:9010", DEFAULT_TIMEOUT, DEFAULT_MAX_RETRIES)
    }
}

impl PurpleAgentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            max_retries,
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return a cached connection for `url`, performing implicit
    /// discovery (a `GET` against the agent-card endpoint) on first
    /// access.
    async fn connect(&self, url: &str) -> Result<AgentConnection, PurpleAgentError> {
        {
            let cache = self.connections.lock().await;
            if let Some(conn) = cache.get(url) {
                return Ok(conn.clone());
            }
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| PurpleAgentError::Transport(e.to_string()))?;

        client
            .get(format!("{url}/.well-known/agent-card.json"))
            .send()
            .await
            .map_err(|e| PurpleAgentError::Transport(e.to_string()))?;

        let conn = AgentConnection { client };
        self.connections
            .lock()
            .await
            .insert(url.to_string(), conn.clone());
        Ok(conn)
    }

    /// Clear every cached connection. Always called from the
    /// executor's cleanup path, cancellation included.
    pub async fn close(&self) {
        self.connections.lock().await.clear();
    }

    /// Send `spec` to the Purple agent for `track` and return the
    /// generated test source. Retries transport failures up to
    /// `max_retries` times with `2^attempt` second backoff; a
    /// syntax-invalid or empty response is surfaced immediately without
    /// retry.
    pub async fn generate_tests(&self, spec: &str, track: Track) -> Result<String, PurpleAgentError> {
        let message = format!("{track}:{spec}");
        let mut last_error: Option<String> = None;

        for attempt in 0..self.max_retries {
            tracing::info!(attempt = attempt + 1, max = self.max_retries, "sending request to Purple agent");

            match self.attempt(&message).await {
                Ok(tests) => return Ok(tests),
                Err(AttemptError::NonRetryable(err)) => return Err(err),
                Err(AttemptError::Retryable(msg)) => {
                    tracing::warn!(attempt = attempt + 1, error = %msg, "Purple agent request failed");
                    last_error = Some(msg);
                    if attempt + 1 < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(PurpleAgentError::Exhausted {
            attempts: self.max_retries,
            last: last_error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    async fn attempt(&self, message: &str) -> Result<String, AttemptError> {
        let conn = self
            .connect(&self.base_url)
            .await
            .map_err(|e| AttemptError::Retryable(e.to_string()))?;

        let response = conn
            .client
            .post(format!("{}/message:send", self.base_url))
            .json(&SendMessageRequest { message })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Retryable("request timed out".to_string())
                } else {
                    AttemptError::Retryable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AttemptError::Retryable(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let parsed: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Retryable(format!("failed to parse response: {e}")))?;

        if parsed.state != "completed" {
            return Err(AttemptError::Retryable(format!(
                "task did not complete (state={})",
                parsed.state
            )));
        }

        let tests = parsed
            .artifacts
            .iter()
            .flat_map(|a| a.parts.iter())
            .find_map(|p| p.text.clone());

        let tests = match tests {
            Some(tests) => tests,
            None => return Err(AttemptError::NonRetryable(PurpleAgentError::EmptyResponse)),
        };

        tracing::info!(chars = tests.len(), "received response from Purple agent");

        if let Err(e) = validate_python_syntax(&tests) {
            tracing::error!(error = %e, "invalid Python syntax in Purple agent response");
            return Err(AttemptError::NonRetryable(PurpleAgentError::InvalidSyntax(e)));
        }

        Ok(tests)
    }
}

enum AttemptError {
    Retryable(String),
    NonRetryable(PurpleAgentError),
}

fn validate_python_syntax(source: &str) -> Result<(), String> {
    rustpython_parser::parse(
        source,
        rustpython_parser::Mode::Module,
        "<purple-agent-response>",
    )
    .map(|_| ())
    .map_err(|e| e.to_string())
}
