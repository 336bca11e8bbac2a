use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use domain::artifacts::{self, PrimaryArtifact};
use domain::completion::{CompletionBackend, CompletionRequest, StreamEvent};
use domain::sandbox::{self, SandboxConfig};
use domain::session::{Message, Session};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 64;

/// The bundle delivered on successful generation. `session` is the updated
/// conversation state (prior history plus the new user and assistant turns).
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub full_text: String,
    pub primary: PrimaryArtifact,
    pub sandbox: SandboxConfig,
    pub session: Session,
}

/// One snapshot on the generation stream: zero or more `Progress` updates
/// followed by exactly one terminal `Finished` or `Failed`.
#[derive(Debug, Clone)]
pub enum GenerationUpdate {
    Progress { text: String },
    Finished(GenerationResult),
    Failed { message: String, partial: String },
}

/// Rejections raised before any network activity, kept apart from
/// downstream failures so the caller can show a soft notice instead of an
/// error banner.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("describe what you would like to build first")]
    EmptyInput,

    #[error("a generation is already running for this session")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Finalizing,
    Succeeded,
    Failed,
}

/// Drives one generation end to end: prompt assembly, stream consumption,
/// extraction and sandbox derivation. At most one generation runs per
/// service instance at a time.
pub struct GenerationService<C> {
    backend: C,
    system_prompt: String,
    model: String,
    in_flight: Arc<AtomicBool>,
}

/// Releases the single-flight slot, including when the driving task is
/// abandoned mid-stream.
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<C: CompletionBackend> GenerationService<C> {
    pub fn new(backend: C, system_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.into(),
            model: model.into(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a generation for `description` on top of `session`.
    ///
    /// The session is taken by value; the caller keeps its own copy and
    /// adopts the updated one from the `Finished` snapshot, so a failed or
    /// abandoned generation leaves the caller's history untouched. Dropping
    /// the returned receiver cancels the generation, even while it is
    /// parked waiting on the upstream stream.
    pub fn generate(
        &self,
        description: &str,
        session: Session,
    ) -> Result<mpsc::Receiver<GenerationUpdate>, GenerationError> {
        if description.trim().is_empty() {
            return Err(GenerationError::EmptyInput);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GenerationError::Busy);
        }
        let guard = FlightGuard(self.in_flight.clone());

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let backend = self.backend.clone();
        let system_prompt = self.system_prompt.clone();
        let model = self.model.clone();
        let description = description.to_string();
        tokio::spawn(async move {
            drive(backend, system_prompt, model, description, session, tx, guard).await;
        });
        Ok(rx)
    }
}

async fn drive<C: CompletionBackend>(
    backend: C,
    system_prompt: String,
    model: String,
    description: String,
    mut session: Session,
    tx: mpsc::Sender<GenerationUpdate>,
    guard: FlightGuard,
) {
    let mut phase = Phase::Streaming;

    // The request carries the system prompt; the persisted history never
    // does.
    let mut messages = Vec::with_capacity(session.history.len() + 2);
    messages.push(Message::system(&system_prompt));
    messages.extend(session.history.iter().cloned());
    messages.push(Message::user(&description));
    let request = CompletionRequest::new(model, messages);

    tracing::debug!(session = %session.id, ?phase, "generation started");
    let mut events = match backend.complete(request).await {
        Ok(events) => events,
        Err(e) => {
            finish_failed(tx, guard, e.to_string(), String::new()).await;
            return;
        }
    };

    let mut buffer = String::new();
    while phase == Phase::Streaming {
        // Waking on a closed channel as well keeps cancellation prompt
        // even when the upstream stream has stalled.
        let event = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!(session = %session.id, "generation abandoned");
                return;
            }
            event = events.recv() => event,
        };
        match event {
            Some(StreamEvent::Delta(delta)) => {
                buffer.push_str(&delta);
                let snapshot = GenerationUpdate::Progress {
                    text: buffer.clone(),
                };
                if tx.send(snapshot).await.is_err() {
                    // Cancelled: abandon the stream, commit nothing.
                    tracing::debug!(session = %session.id, "generation abandoned");
                    return;
                }
            }
            Some(StreamEvent::Done) => phase = Phase::Finalizing,
            Some(StreamEvent::Error(message)) => {
                finish_failed(tx, guard, message, buffer).await;
                return;
            }
            None => {
                let message = "completion stream closed before finishing".to_string();
                finish_failed(tx, guard, message, buffer).await;
                return;
            }
        }
    }

    session.push_user(description);
    session.push_assistant(buffer.clone());

    let files = artifacts::extract_files(&buffer);
    let primary = artifacts::primary_file(&files);
    let sandbox = sandbox::build_sandbox(&primary);

    phase = Phase::Succeeded;
    tracing::debug!(session = %session.id, ?phase, kind = ?primary.kind, "generation finished");
    let _ = tx
        .send(GenerationUpdate::Finished(GenerationResult {
            full_text: buffer,
            primary,
            sandbox,
            session,
        }))
        .await;
    // The guard outlives the send: the slot opens only once the terminal
    // snapshot is on the channel.
    drop(guard);
}

async fn finish_failed(
    tx: mpsc::Sender<GenerationUpdate>,
    guard: FlightGuard,
    message: String,
    partial: String,
) {
    tracing::warn!(phase = ?Phase::Failed, %message, "generation failed");
    let _ = tx.send(GenerationUpdate::Failed { message, partial }).await;
    drop(guard);
}
