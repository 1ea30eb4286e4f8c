use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corpus directory '{}' not found", .0.display())]
    NotFound(PathBuf),

    #[error("no files with extensions [{extensions}] found under '{}'", root.display())]
    NoFilesFound { root: PathBuf, extensions: String },

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("invalid splitter configuration: {0}")]
    InvalidConfig(String),
}
