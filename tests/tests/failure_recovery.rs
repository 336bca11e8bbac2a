use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use application::generator::{GenerationService, GenerationUpdate};
use domain::completion::{CompletionBackend, CompletionError, CompletionRequest, StreamEvent};
use domain::session::Session;
use infrastructure::retry::{with_retry, RetryPolicy};
use shared::types::Result;
use tokio::sync::mpsc;

/// Fails the first generation mid-stream, then streams cleanly.
#[derive(Clone)]
struct FlakyBackend {
    calls: Arc<AtomicUsize>,
}

impl CompletionBackend for FlakyBackend {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<mpsc::Receiver<StreamEvent>, CompletionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            if call == 0 {
                let _ = tx.send(StreamEvent::Delta("half an ans".to_string())).await;
                let _ = tx
                    .send(StreamEvent::Error("connection reset by peer".to_string()))
                    .await;
            } else {
                let _ = tx.send(StreamEvent::Delta("<p>done</p>".to_string())).await;
                let _ = tx.send(StreamEvent::Done).await;
            }
        });
        Ok(rx)
    }
}

#[tokio::test]
async fn a_failed_turn_can_be_retried_without_losing_context() -> Result<()> {
    let backend = FlakyBackend {
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let service = GenerationService::new(backend, "system prompt", "test-model");

    let mut session = Session::new("session-r");
    session.push_user("earlier");
    session.push_assistant("turn");

    // First attempt dies mid-stream; the caller's session is untouched.
    let mut rx = service.generate("a paragraph", session.clone())?;
    let mut failed = None;
    while let Some(update) = rx.recv().await {
        if let GenerationUpdate::Failed { message, partial } = update {
            failed = Some((message, partial));
        }
    }
    let (message, partial) = failed.expect("missing Failed snapshot");
    assert_eq!(message, "connection reset by peer");
    assert_eq!(partial, "half an ans");
    assert_eq!(session.history.len(), 2);

    // The slot was released, so retrying with the same session works.
    let mut rx = service.generate("a paragraph", session.clone())?;
    let mut finished = None;
    while let Some(update) = rx.recv().await {
        if let GenerationUpdate::Finished(result) = update {
            finished = Some(result);
        }
    }
    let result = finished.expect("missing Finished snapshot");
    assert_eq!(result.full_text, "<p>done</p>");
    assert_eq!(result.session.history.len(), 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn connect_retries_back_off_exponentially() {
    let policy = RetryPolicy::new(2);
    let calls = AtomicUsize::new(0);
    let started = tokio::time::Instant::now();

    let outcome: std::result::Result<(), (usize, String)> = with_retry(&policy, || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err("no route to host".to_string()) }
    })
    .await;

    let (retries, _) = outcome.unwrap_err();
    assert_eq!(retries, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}
