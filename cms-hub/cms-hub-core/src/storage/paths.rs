use std::path::{Path, PathBuf};

/// Maps logical document names onto a single flat storage root.
///
/// Names are reduced to their final component before joining, so a caller
/// can never reach outside the root. Resolution never fails.
#[derive(Clone, Debug)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root itself, used for listings.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Strip every directory component from `name`.
    ///
    /// `/` and `\` both count as separators. `.` and `..` reduce to the empty
    /// name, which resolves to the root and therefore never names a file.
    pub fn sanitize(name: &str) -> String {
        let base = name
            .rsplit(|c: char| c == '/' || c == '\\')
            .find(|part| !part.is_empty())
            .unwrap_or("");
        match base {
            "." | ".." => String::new(),
            other => other.to_string(),
        }
    }

    /// Absolute location of the document called `name`.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let base = Self::sanitize(name);
        if base.is_empty() {
            self.root.clone()
        } else {
            self.root.join(base)
        }
    }

    /// Sidecar holding the history of `name`: a dotfile derived from the
    /// document name with its dots replaced by underscores.
    pub fn history_path(&self, name: &str) -> PathBuf {
        let base = Self::sanitize(name).replace('.', "_");
        self.root.join(format!(".{}.json", base))
    }
}
