use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Html,
    Jsx,
    Tsx,
    Css,
    Js,
}

impl FileKind {
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Html => "html",
            FileKind::Jsx => "jsx",
            FileKind::Tsx => "tsx",
            FileKind::Css => "css",
            FileKind::Js => "js",
        }
    }
}

/// Typed file buffers parsed out of one model response. At most one entry
/// per kind; same-kind fenced blocks are concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFiles {
    pub html: Option<String>,
    pub jsx: Option<String>,
    pub tsx: Option<String>,
    pub css: Option<String>,
    pub js: Option<String>,
}

/// The single file chosen to represent the generated app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryArtifact {
    pub content: String,
    pub kind: FileKind,
}

static HTML_BLOCK: Lazy<Regex> = Lazy::new(|| fence_pattern("html"));
static JSX_BLOCK: Lazy<Regex> = Lazy::new(|| fence_pattern("jsx"));
static TSX_BLOCK: Lazy<Regex> = Lazy::new(|| fence_pattern("tsx"));
static CSS_BLOCK: Lazy<Regex> = Lazy::new(|| fence_pattern("css"));
static JS_BLOCK: Lazy<Regex> = Lazy::new(|| fence_pattern("(?:javascript|js)"));

fn fence_pattern(label: &str) -> Regex {
    // Case-insensitive, non-greedy, dot matches newline.
    Regex::new(&format!(r"(?si)```{label}\n(.+?)\n```"))
        .unwrap_or_else(|e| panic!("invalid fence pattern for {label}: {e}"))
}

/// Scan `raw` for fenced code blocks of each recognized kind.
///
/// Multiple blocks of the same kind are joined with a single newline in
/// order of appearance, then trimmed. If none of html/jsx/tsx matched, the
/// whole trimmed text lands in the html slot, so non-empty input never
/// produces a fully empty result.
pub fn extract_files(raw: &str) -> ExtractedFiles {
    let mut files = ExtractedFiles {
        html: collect_blocks(&HTML_BLOCK, raw),
        jsx: collect_blocks(&JSX_BLOCK, raw),
        tsx: collect_blocks(&TSX_BLOCK, raw),
        css: collect_blocks(&CSS_BLOCK, raw),
        js: collect_blocks(&JS_BLOCK, raw),
    };

    if files.html.is_none() && files.jsx.is_none() && files.tsx.is_none() {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            files.html = Some(trimmed.to_string());
        }
    }

    files
}

fn collect_blocks(pattern: &Regex, raw: &str) -> Option<String> {
    let joined = pattern
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Pick the artifact that stands for the whole response, by fixed priority
/// tsx > jsx > html > js. All absent yields an empty html artifact.
pub fn primary_file(files: &ExtractedFiles) -> PrimaryArtifact {
    let (content, kind) = if let Some(tsx) = &files.tsx {
        (tsx.clone(), FileKind::Tsx)
    } else if let Some(jsx) = &files.jsx {
        (jsx.clone(), FileKind::Jsx)
    } else if let Some(html) = &files.html {
        (html.clone(), FileKind::Html)
    } else if let Some(js) = &files.js {
        (js.clone(), FileKind::Js)
    } else {
        (String::new(), FileKind::Html)
    };
    PrimaryArtifact { content, kind }
}
