//! Error type shared by every storage operation.

/// Failures reported by the document store and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Name has no supported extension, an empty stem, or is hidden.
    #[error("{0} is not a valid document name")]
    InvalidName(String),

    /// Uploaded bytes cannot be stored as the document's kind.
    #[error("{0} has content that does not match its type")]
    InvalidContent(String),

    /// No readable document exists under this name.
    #[error("{0} does not exist")]
    NotFound(String),

    /// A rename tried to change the extension.
    #[error("cannot rename {from} to {to}: extensions must match")]
    ExtensionMismatch { from: String, to: String },

    /// A rename target already holds another document.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The document kind does not accept text edits.
    #[error("{0} cannot be edited")]
    NotEditable(String),

    /// The caller is not signed in.
    #[error("you must be signed in to do that")]
    Unauthorized,

    /// A history key was appended twice.
    ///
    /// `HistoryStore::mint_timestamp` never returns a key that is already in
    /// use, so this only surfaces when a caller supplies its own key.
    #[error("history for {name} already has an entry at {timestamp}")]
    HistoryKeyCollision { name: String, timestamp: String },

    /// A history sidecar could not be parsed or serialized.
    #[error("history sidecar is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Any other filesystem failure.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}
