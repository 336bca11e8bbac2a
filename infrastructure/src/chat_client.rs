use std::sync::Arc;

use domain::completion::{CompletionBackend, CompletionError, CompletionRequest, StreamEvent};
use domain::session::Message;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::retry::{with_retry, RetryPolicy};

// Fixed sampling parameters for code generation.
const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 4000;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

/// Streaming client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Establishing the response is retried with exponential backoff; once the
/// body is streaming, failures are forwarded as `StreamEvent::Error` and
/// never retried, so partial output already delivered stays delivered.
#[derive(Clone)]
pub struct ChatCompletionClient {
    http: Arc<Client>,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl ChatCompletionClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_retry_policy(base_url, api_key, RetryPolicy::default())
    }

    pub fn with_retry_policy(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http: Arc::new(Client::new()),
            base_url: base_url.into(),
            api_key: api_key.into(),
            retry,
        }
    }

    async fn open_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response, CompletionError> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let body = ChatRequestBody {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl CompletionBackend for ChatCompletionClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, CompletionError> {
        let response = with_retry(&self.retry, || self.open_stream(&request))
            .await
            .map_err(|(attempts, last)| CompletionError::RetriesExhausted {
                attempts,
                last: last.to_string(),
            })?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            if let Err(e) = forward_stream(response.bytes_stream(), &tx).await {
                tracing::error!(error = %e, "completion stream failed");
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
            }
        });
        Ok(rx)
    }
}

/// What one SSE line contributes to the event stream.
#[derive(Debug, Default, PartialEq, Eq)]
struct ParsedLine {
    delta: Option<String>,
    done: bool,
}

fn parse_sse_line(line: &str) -> ParsedLine {
    let Some(data) = line.strip_prefix("data:") else {
        // Comments, keepalives and blank lines carry nothing.
        return ParsedLine::default();
    };
    let data = data.trim();
    if data.is_empty() {
        return ParsedLine::default();
    }
    if data == "[DONE]" {
        return ParsedLine {
            delta: None,
            done: true,
        };
    }
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => {
            let Some(choice) = chunk.choices.into_iter().next() else {
                return ParsedLine::default();
            };
            ParsedLine {
                delta: choice.delta.content.filter(|c| !c.is_empty()),
                done: choice.finish_reason.is_some(),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed stream line");
            ParsedLine::default()
        }
    }
}

/// Forward one parsed line onto the event channel. Returns true when the
/// stream should stop: terminal marker seen, or the receiver hung up.
async fn emit_line(line: &str, tx: &mpsc::Sender<StreamEvent>) -> bool {
    let parsed = parse_sse_line(line);
    if let Some(delta) = parsed.delta {
        if tx.send(StreamEvent::Delta(delta)).await.is_err() {
            return true;
        }
    }
    if parsed.done {
        let _ = tx.send(StreamEvent::Done).await;
        return true;
    }
    false
}

async fn forward_stream<S, B, E>(
    body: S,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<(), CompletionError>
where
    S: futures::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    futures::pin_mut!(body);
    let mut buf = String::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| CompletionError::Transport(e.to_string()))?;
        buf.push_str(&String::from_utf8_lossy(chunk.as_ref()));

        while let Some(pos) = buf.find('\n') {
            let line = buf[..pos].trim_end_matches('\r').to_string();
            buf.drain(..=pos);
            if emit_line(&line, tx).await {
                return Ok(());
            }
        }
    }

    // Some providers omit the newline after the last line.
    let last = buf.trim_end_matches('\r').to_string();
    if emit_line(&last, tx).await {
        return Ok(());
    }

    Err(CompletionError::Transport(
        "stream ended without a terminal marker".to_string(),
    ))
}
