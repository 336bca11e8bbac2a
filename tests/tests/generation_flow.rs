use application::export::{export_content, ExportFormat};
use application::generator::{GenerationService, GenerationUpdate};
use domain::artifacts::FileKind;
use domain::completion::{CompletionBackend, CompletionError, CompletionRequest, StreamEvent};
use domain::sandbox::SandboxTemplate;
use domain::session::{Role, Session};
use tokio::sync::mpsc;

/// Backend that streams a fixed response in several chunks, the way an
/// OpenAI-compatible provider would.
#[derive(Clone)]
struct ScriptedBackend {
    chunks: Vec<&'static str>,
}

impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, CompletionError> {
        let (tx, rx) = mpsc::channel(16);
        let chunks = self.chunks.clone();
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(StreamEvent::Delta(chunk.to_string())).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamEvent::Done).await;
        });
        Ok(rx)
    }
}

#[tokio::test]
async fn todo_list_description_flows_into_a_react_preview() {
    let backend = ScriptedBackend {
        chunks: vec![
            "```tsx\n",
            "export default function App(){return null}",
            "\n```",
        ],
    };
    let service = GenerationService::new(backend, "system prompt", "test-model");

    let mut rx = service
        .generate("Create a todo list", Session::new("session-1"))
        .unwrap();

    let mut progress_seen = 0;
    let mut result = None;
    while let Some(update) = rx.recv().await {
        match update {
            GenerationUpdate::Progress { text } => {
                progress_seen += 1;
                // Snapshots accumulate the full buffer so far.
                assert!("```tsx\nexport default function App(){return null}\n```".starts_with(&text));
            }
            GenerationUpdate::Finished(r) => result = Some(r),
            GenerationUpdate::Failed { message, .. } => panic!("unexpected failure: {message}"),
        }
    }
    assert_eq!(progress_seen, 3);

    let result = result.expect("missing Finished snapshot");
    assert_eq!(result.primary.kind, FileKind::Tsx);
    assert_eq!(
        result.primary.content,
        "export default function App(){return null}"
    );

    // React preview: two virtual files, non-empty import map.
    assert_eq!(result.sandbox.template, SandboxTemplate::React);
    assert_eq!(result.sandbox.files.len(), 2);
    assert!(!result.sandbox.imports.is_empty());
    assert_eq!(
        result.sandbox.files.get("./demo.tsx"),
        Some(&result.primary.content)
    );

    // History grew by the user turn and the assistant turn, nothing else.
    assert_eq!(result.session.history.len(), 2);
    assert_eq!(result.session.history[0].role, Role::User);
    assert_eq!(result.session.history[0].content, "Create a todo list");
    assert_eq!(result.session.history[1].role, Role::Assistant);
    assert_eq!(result.session.history[1].content, result.full_text);

    // The artifact exports under a React-appropriate name.
    let file = export_content(&result.primary.content, ExportFormat::Auto).unwrap();
    assert_eq!(file.filename, "generated_code.tsx");
}

#[tokio::test]
async fn plain_text_answer_degrades_to_an_html_preview() {
    let backend = ScriptedBackend {
        chunks: vec!["Sure! Here is a heading: ", "<h1>Hello</h1>"],
    };
    let service = GenerationService::new(backend, "system prompt", "test-model");

    let mut rx = service
        .generate("just a heading", Session::new("session-2"))
        .unwrap();

    let mut result = None;
    while let Some(update) = rx.recv().await {
        if let GenerationUpdate::Finished(r) = update {
            result = Some(r);
        }
    }

    let result = result.expect("missing Finished snapshot");
    assert_eq!(result.primary.kind, FileKind::Html);
    assert_eq!(result.sandbox.template, SandboxTemplate::Html);
    assert!(result.sandbox.imports.is_empty());
    assert_eq!(result.sandbox.files.len(), 1);
    assert_eq!(
        result.sandbox.files.get("./index.html").map(String::as_str),
        Some("Sure! Here is a heading: <h1>Hello</h1>")
    );

    // A second generation reuses the grown history.
    let mut rx = service
        .generate("make it blue", result.session.clone())
        .unwrap();
    let mut second = None;
    while let Some(update) = rx.recv().await {
        if let GenerationUpdate::Finished(r) = update {
            second = Some(r);
        }
    }
    assert_eq!(second.expect("missing Finished").session.history.len(), 4);
}
