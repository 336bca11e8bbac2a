/// Requested export format; `Auto` sniffs the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Auto,
    Tsx,
    Html,
    Txt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub content: String,
    pub filename: String,
}

/// Pick a download filename for generated content. Auto-detection looks
/// for React markers first, then an `<html` tag, and falls back to plain
/// text. Empty content exports nothing.
pub fn export_content(content: &str, format: ExportFormat) -> Option<ExportFile> {
    if content.is_empty() {
        return None;
    }
    let extension = match format {
        ExportFormat::Tsx => "tsx",
        ExportFormat::Html => "html",
        ExportFormat::Txt => "txt",
        ExportFormat::Auto => {
            if content.contains("import React") || content.contains("export default") {
                "tsx"
            } else if content.to_lowercase().contains("<html") {
                "html"
            } else {
                "txt"
            }
        }
    };
    Some(ExportFile {
        content: content.to_string(),
        filename: format!("generated_code.{extension}"),
    })
}
