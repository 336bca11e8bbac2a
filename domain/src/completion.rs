use serde::Serialize;
use tokio::sync::mpsc;

use crate::session::Message;

/// One chat-completion request: the model identifier plus the full ordered
/// message list (system prompt included) sent upstream.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// One event on a streaming completion.
///
/// `Done` is the provider's terminal marker, distinct from an empty delta.
/// `Error` carries a mid-stream failure; deltas observed before it remain
/// valid partial output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("api error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: String },
}

/// A provider able to stream chat completions. Events arrive on the
/// returned channel; the sender side closes after a terminal `Done` or
/// `Error`.
pub trait CompletionBackend: Clone + Send + Sync + 'static {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<mpsc::Receiver<StreamEvent>, CompletionError>> + Send;
}
