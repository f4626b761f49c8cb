//! Collaborator traits for on-disk compilation databases.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use basalt_core::CompileCommand;
use thiserror::Error;

/// Errors produced while loading a compilation database from a directory.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The directory has no database at all. Routine during ancestor walks.
    #[error("no compilation database in {dir}")]
    NotFound { dir: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Structurally valid file whose contents the loader cannot use.
    #[error("malformed compilation database {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

impl LoadError {
    /// True when the directory simply has no database, as opposed to a broken
    /// one.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. })
    }
}

/// A loaded, queryable compilation database for one directory.
pub trait Database: Send + Sync + fmt::Debug {
    /// Every command the database holds for `file`, possibly none.
    fn commands_for(&self, file: &Path) -> Vec<CompileCommand>;

    /// Absolute paths of every file the database knows about.
    fn all_files(&self) -> Vec<PathBuf>;
}

/// Loads a compilation database from a directory.
pub trait DatabaseLoader: Send + Sync + fmt::Debug {
    fn load(&self, dir: &Path) -> Result<Arc<dyn Database>, LoadError>;
}
