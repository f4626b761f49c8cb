//! Core shared types for Basalt.
//!
//! This crate is intentionally small.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single compiler invocation used to analyze one translation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCommand {
    /// Working directory for the invocation.
    pub directory: PathBuf,
    /// The file being compiled.
    pub filename: PathBuf,
    /// Full argument vector. `arguments[0]` is the executable; the vector is
    /// never empty.
    pub arguments: Vec<String>,
    /// Declared build output, when the build recorded one.
    pub output: Option<String>,
}

impl CompileCommand {
    pub fn new(
        directory: impl Into<PathBuf>,
        filename: impl Into<PathBuf>,
        arguments: Vec<String>,
        output: Option<String>,
    ) -> Self {
        debug_assert!(!arguments.is_empty(), "argument vector must name an executable");
        Self {
            directory: directory.into(),
            filename: filename.into(),
            arguments,
            output,
        }
    }
}

/// Where a resolved compile command came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Directory whose database answered the query; `None` when an explicit
    /// override answered instead.
    pub source_root: Option<PathBuf>,
}
