//! Document CRUD over the flat storage root.
//!
//! Content lives in `<root>/<name>`; history lives in the sidecar managed by
//! [`HistoryStore`]. Every content change goes through the history so the
//! newest snapshot always matches what was last saved.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::history::{HistoryEntry, HistoryStore};
use super::index::DirectoryIndex;
use super::kind::{extension, stem, DocumentKind};
use super::paths::PathResolver;
use super::{Result, StoreError};
use crate::auth::{Authenticator, Principal};

/// A document as read from disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    name: String,
    kind: DocumentKind,
    content: Vec<u8>,
}

impl Document {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    /// Content as text, `None` for images or invalid UTF-8.
    pub fn text(&self) -> Option<&str> {
        if self.kind.is_text() {
            std::str::from_utf8(&self.content).ok()
        } else {
            None
        }
    }
}

/// User-facing messages collected while handling one request.
///
/// The caller owns the list and decides how to present it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Notices(Vec<String>);

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Filesystem-backed store for documents and their histories.
///
/// Mutating operations take `&mut self` so a shared store must be write
/// locked while they run.
pub struct DocumentStore {
    paths: PathResolver,
    history: HistoryStore,
    index: DirectoryIndex,
    authenticator: Arc<dyn Authenticator>,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>, authenticator: Arc<dyn Authenticator>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let paths = PathResolver::new(dir);
        Ok(Self {
            history: HistoryStore::new(paths.clone()),
            index: DirectoryIndex::new(paths.clone()),
            paths,
            authenticator,
        })
    }

    /// Directory where documents are persisted.
    pub fn data_dir(&self) -> &Path {
        self.paths.root()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    fn authorize(&self, principal: &Principal) -> Result<()> {
        if self.authenticator.is_authenticated(principal) {
            Ok(())
        } else {
            debug!(?principal, "rejected unauthenticated mutation");
            Err(StoreError::Unauthorized)
        }
    }

    /// Sanitized name and path of an existing, servable document.
    fn existing(&self, name: &str) -> Result<(String, PathBuf)> {
        let base = PathResolver::sanitize(name);
        let path = self.paths.resolve(&base);
        if base.is_empty()
            || base.starts_with('.')
            || !path.is_file()
            || !DocumentKind::of(&base).is_supported()
        {
            return Err(StoreError::NotFound(base));
        }
        Ok((base, path))
    }

    /// Sanitize a name for a new document and check its extension.
    fn new_name(name: &str, allow_images: bool) -> Result<(String, DocumentKind)> {
        let base = PathResolver::sanitize(name);
        let kind = DocumentKind::of(&base);
        let has_stem = stem(&base).is_some_and(|s| !s.is_empty());
        let allowed = kind.is_text() || (allow_images && kind == DocumentKind::Image);
        if base.starts_with('.') || !has_stem || !allowed {
            return Err(StoreError::InvalidName(base));
        }
        Ok((base, kind))
    }

    fn write_new(&self, base: &str, kind: DocumentKind, content: &[u8]) -> Result<()> {
        let text = if kind.is_text() {
            Some(
                std::str::from_utf8(content)
                    .map_err(|_| StoreError::InvalidContent(base.to_string()))?,
            )
        } else {
            None
        };
        std::fs::write(self.paths.resolve(base), content)?;
        // Image bytes are not snapshotted; their history only holds the
        // placeholder.
        self.history.seed(base, text.unwrap_or(""))?;
        Ok(())
    }

    /// Create a text document (`.md` or `.txt`) with `content`.
    ///
    /// Re-creating an existing name overwrites its content and extends, never
    /// resets, its history.
    pub fn create(
        &mut self,
        principal: &Principal,
        name: &str,
        content: &str,
        notices: &mut Notices,
    ) -> Result<()> {
        self.authorize(principal)?;
        let (base, kind) = Self::new_name(name, false)?;
        self.write_new(&base, kind, content.as_bytes())?;
        info!(name = %base, kind = kind.as_str(), bytes = content.len(), "created document");
        notices.push(format!("{} has been created.", base));
        Ok(())
    }

    /// Store uploaded bytes as a text or image document.
    pub fn upload(
        &mut self,
        principal: &Principal,
        name: &str,
        bytes: &[u8],
        notices: &mut Notices,
    ) -> Result<()> {
        self.authorize(principal)?;
        let (base, kind) = Self::new_name(name, true)?;
        self.write_new(&base, kind, bytes)?;
        info!(name = %base, kind = kind.as_str(), bytes = bytes.len(), "uploaded document");
        notices.push(format!("{} has been uploaded.", base));
        Ok(())
    }

    /// Current content and kind of `name`.
    pub fn read(&self, name: &str) -> Result<Document> {
        let (base, path) = self.existing(name)?;
        let content = std::fs::read(&path)?;
        Ok(Document {
            kind: DocumentKind::of(&base),
            name: base,
            content,
        })
    }

    /// Rename and/or edit a document. Returns the document's final name.
    ///
    /// The extension check and every other validation happen before anything
    /// on disk changes. A rename moves the content file first and the history
    /// sidecar second. Content equal to the newest snapshot is not written.
    pub fn update(
        &mut self,
        principal: &Principal,
        name: &str,
        new_name: Option<&str>,
        new_content: Option<&str>,
        notices: &mut Notices,
    ) -> Result<String> {
        self.authorize(principal)?;
        let (current, path) = self.existing(name)?;
        let target = new_name
            .map(PathResolver::sanitize)
            .unwrap_or_else(|| current.clone());

        if extension(&current) != extension(&target) {
            return Err(StoreError::ExtensionMismatch {
                from: current,
                to: target,
            });
        }
        if target.starts_with('.') || stem(&target).map_or(true, str::is_empty) {
            return Err(StoreError::InvalidName(target));
        }
        if new_content.is_some() && !DocumentKind::of(&current).is_text() {
            return Err(StoreError::NotEditable(current));
        }

        if target != current {
            let target_path = self.paths.resolve(&target);
            if target_path.exists() {
                return Err(StoreError::AlreadyExists(target));
            }
            std::fs::rename(&path, &target_path)?;
            self.history.rename(&current, &target)?;
            info!(from = %current, to = %target, "renamed document");
            notices.push(format!("{} has been renamed to {}.", current, target));
        }

        if let Some(content) = new_content {
            if self.history.latest(&target)? == content {
                debug!(name = %target, "content unchanged, nothing saved");
            } else {
                std::fs::write(self.paths.resolve(&target), content)?;
                let timestamp = self.history.record(&target, content)?;
                info!(name = %target, %timestamp, bytes = content.len(), "updated document");
                notices.push(format!("{} has been updated.", target));
            }
        }
        Ok(target)
    }

    /// Copy `name` to `<stem> copy.<ext>` with a fresh history.
    pub fn duplicate(
        &mut self,
        principal: &Principal,
        name: &str,
        notices: &mut Notices,
    ) -> Result<String> {
        self.authorize(principal)?;
        let doc = self.read(name)?;
        let copy = duplicate_name(doc.name());
        let (base, kind) = Self::new_name(&copy, true)?;
        self.write_new(&base, kind, doc.content())?;
        info!(from = %doc.name(), to = %base, "duplicated document");
        notices.push(format!("{} has been created.", base));
        Ok(base)
    }

    /// Remove a document and its history.
    ///
    /// The content file goes first; a missing history sidecar is tolerated.
    pub fn delete(
        &mut self,
        principal: &Principal,
        name: &str,
        notices: &mut Notices,
    ) -> Result<()> {
        self.authorize(principal)?;
        let (base, path) = self.existing(name)?;
        std::fs::remove_file(&path)?;
        self.history.delete(&base)?;
        info!(name = %base, "deleted document");
        notices.push(format!("{} has been deleted.", base));
        Ok(())
    }

    /// Every saved version of `name`, oldest first. Never empty.
    pub fn list_versions(&self, name: &str) -> Result<Vec<HistoryEntry>> {
        let (base, _) = self.existing(name)?;
        self.history.entries(&base)
    }

    /// One saved version of `name`. Current content is left untouched.
    pub fn read_version(&self, name: &str, timestamp: &str) -> Result<HistoryEntry> {
        let (base, _) = self.existing(name)?;
        self.history
            .get(&base, timestamp)?
            .ok_or_else(|| StoreError::NotFound(format!("{} at {}", base, timestamp)))
    }

    /// Sorted names of all listable documents.
    pub fn list(&self) -> Result<Vec<String>> {
        self.index.list()
    }
}

/// `report.txt` becomes `report copy.txt`.
pub fn duplicate_name(name: &str) -> String {
    match (stem(name), extension(name)) {
        (Some(stem), Some(ext)) => format!("{} copy.{}", stem, ext),
        _ => format!("{} copy", name),
    }
}
