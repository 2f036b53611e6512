use super::kind::DocumentKind;
use super::paths::PathResolver;
use super::Result;

/// Listing of the storable documents under the root.
///
/// Recomputed from the directory on every call, never cached.
#[derive(Clone, Debug)]
pub struct DirectoryIndex {
    paths: PathResolver,
}

impl DirectoryIndex {
    pub fn new(paths: PathResolver) -> Self {
        Self { paths }
    }

    /// Regular files with a supported extension, hidden entries (which
    /// include every history sidecar) skipped, sorted ascending.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.paths.root())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || !DocumentKind::of(&name).is_supported() {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}
