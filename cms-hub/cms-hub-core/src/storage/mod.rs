//! Flat, file-backed document storage. Each document lives in a single
//! storage root next to a hidden sidecar that holds its version history.

pub mod documents;
pub mod error;
pub mod history;
pub mod index;
pub mod kind;
pub mod paths;


pub use documents::{Document, DocumentStore, Notices};
pub use error::StoreError;
pub use history::{HistoryEntry, HistoryStore};
pub use index::DirectoryIndex;
pub use kind::DocumentKind;
pub use paths::PathResolver;

pub type Result<T> = std::result::Result<T, StoreError>;
