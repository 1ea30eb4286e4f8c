use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use super::super::{DEFAULT_EXTENSIONS, Document, DocumentError, DocumentLoader};
use super::TextLoader;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// A corpus file discovered by the walker, before it is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusEntry {
    /// Relative to the corpus root, `/`-separated.
    pub path: String,
    #[serde(skip)]
    pub abs_path: PathBuf,
    pub extension: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub total_files: usize,
    /// Every configured extension is present, including those with no files.
    pub file_types: BTreeMap<String, usize>,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
}

/// Walks a corpus directory for files with the configured extensions.
pub struct CorpusLoader {
    root: PathBuf,
    extensions: Vec<String>,
    loader: Box<dyn DocumentLoader>,
}

impl std::fmt::Debug for CorpusLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusLoader")
            .field("root", &self.root)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl CorpusLoader {
    /// Extensions are matched ASCII case-insensitively; a leading `.` is ignored.
    /// An empty list falls back to [`DEFAULT_EXTENSIONS`].
    pub fn new<S: AsRef<str>>(root: impl Into<PathBuf>, extensions: &[S]) -> Self {
        let mut normalized: Vec<String> = extensions
            .iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if normalized.is_empty() {
            normalized = DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect();
        }
        normalized.sort();
        normalized.dedup();

        Self {
            root: root.into(),
            extensions: normalized,
            loader: Box::new(TextLoader::default()),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: impl DocumentLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    #[must_use]
    pub fn with_max_file_size(self, max_file_size: u64) -> Self {
        self.with_loader(TextLoader { max_file_size })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn matching_extension(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extensions.contains(&ext).then_some(ext)
    }

    /// Enumerate matching files, sorted by relative path. Hidden entries are
    /// skipped and symlinks are not followed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if the root is missing or not a directory.
    pub fn list(&self) -> Result<Vec<CorpusEntry>, DocumentError> {
        if !self.root.is_dir() {
            return Err(DocumentError::NotFound(self.root.clone()));
        }

        let walker = ignore::WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(true)
            .follow_links(false)
            .build();

        let mut entries = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable corpus entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(extension) = self.matching_extension(entry.path()) else {
                continue;
            };
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), "skipping file: {e}");
                    continue;
                }
            };
            entries.push(CorpusEntry {
                path: relative_path(&self.root, entry.path()),
                abs_path: entry.path().to_path_buf(),
                extension,
                size,
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if the root is missing.
    pub fn stats(&self) -> Result<CorpusStats, DocumentError> {
        let entries = self.list()?;

        let mut file_types: BTreeMap<String, usize> =
            self.extensions.iter().map(|e| (e.clone(), 0)).collect();
        let mut total_size_bytes = 0u64;
        for entry in &entries {
            *file_types.entry(entry.extension.clone()).or_default() += 1;
            total_size_bytes += entry.size;
        }

        Ok(CorpusStats {
            total_files: entries.len(),
            file_types,
            total_size_bytes,
            total_size_mb: size_in_mib(total_size_bytes),
        })
    }

    /// Read every matching file. Files that cannot be read (I/O failure,
    /// invalid UTF-8, over the size limit) are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if the root is missing and
    /// [`DocumentError::NoFilesFound`] if nothing matches.
    pub async fn load(&self) -> Result<Vec<Document>, DocumentError> {
        let entries = self.list()?;
        if entries.is_empty() {
            return Err(self.no_files());
        }

        tracing::info!(
            root = %self.root.display(),
            files = entries.len(),
            "loading corpus"
        );

        let mut documents = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.loader.load(entry).await {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::warn!(path = %entry.path, "skipping file: {e}"),
            }
        }

        if documents.is_empty() {
            return Err(self.no_files());
        }
        Ok(documents)
    }

    fn no_files(&self) -> DocumentError {
        DocumentError::NoFilesFound {
            root: self.root.clone(),
            extensions: self.extensions.join(", "),
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[allow(clippy::cast_precision_loss)]
fn size_in_mib(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MIB * 100.0).round() / 100.0
}
