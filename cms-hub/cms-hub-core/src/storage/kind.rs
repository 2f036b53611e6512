use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a stored file is, decided by its extension alone.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Markdown,
    PlainText,
    Image,
    Unsupported,
}

const KINDS: &[(&str, DocumentKind)] = &[
    ("md", DocumentKind::Markdown),
    ("txt", DocumentKind::PlainText),
    ("jpg", DocumentKind::Image),
    ("jpeg", DocumentKind::Image),
    ("png", DocumentKind::Image),
    ("gif", DocumentKind::Image),
];

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Markdown => "markdown",
            DocumentKind::PlainText => "plaintext",
            DocumentKind::Image => "image",
            DocumentKind::Unsupported => "unsupported",
        }
    }

    /// Look up the kind for a bare extension (no leading dot).
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        KINDS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, kind)| *kind)
            .unwrap_or(DocumentKind::Unsupported)
    }

    /// Kind of a filename. Names without an extension are unsupported.
    pub fn of(name: &str) -> Self {
        extension(name)
            .map(Self::from_extension)
            .unwrap_or(DocumentKind::Unsupported)
    }

    /// Text documents: the only kinds `create` accepts and history snapshots.
    pub fn is_text(&self) -> bool {
        matches!(self, DocumentKind::Markdown | DocumentKind::PlainText)
    }

    pub fn is_supported(&self) -> bool {
        *self != DocumentKind::Unsupported
    }

    /// MIME type used when the content is served raw.
    pub fn mime_for(name: &str) -> &'static str {
        match extension(name).map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("md") => "text/markdown; charset=utf-8",
            Some("txt") => "text/plain; charset=utf-8",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            _ => "application/octet-stream",
        }
    }
}

/// Extension of `name` without the dot, `None` for dotfiles and bare stems.
pub fn extension(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str())
}

/// Filename without its final extension.
pub fn stem(name: &str) -> Option<&str> {
    Path::new(name).file_stem().and_then(|s| s.to_str())
}
