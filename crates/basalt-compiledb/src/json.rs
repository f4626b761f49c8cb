//! `compile_commands.json` loading.
//!
//! The minimal [`DatabaseLoader`] implementation: it understands the common
//! fields of the JSON compilation database format (`directory`, `file`,
//! `arguments`/`command`, `output`) and nothing more.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use basalt_core::CompileCommand;
use serde::Deserialize;

use crate::loader::{Database, DatabaseLoader, LoadError};

pub(crate) const DATABASE_FILE: &str = "compile_commands.json";

#[derive(Debug, Deserialize)]
struct JsonEntry {
    directory: PathBuf,
    file: PathBuf,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    output: Option<String>,
}

/// Loads `compile_commands.json` databases.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDatabaseLoader;

impl DatabaseLoader for JsonDatabaseLoader {
    fn load(&self, dir: &Path) -> Result<Arc<dyn Database>, LoadError> {
        let path = dir.join(DATABASE_FILE);
        if !path.is_file() {
            return Err(LoadError::NotFound {
                dir: dir.to_path_buf(),
            });
        }

        let bytes = std::fs::read(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let entries: Vec<JsonEntry> =
            serde_json::from_slice(&bytes).map_err(|source| LoadError::Json {
                path: path.clone(),
                source,
            })?;

        let mut commands = Vec::with_capacity(entries.len());
        for entry in entries {
            // Entry files may be relative to the entry's own directory.
            let file = if entry.file.is_absolute() {
                entry.file
            } else {
                entry.directory.join(&entry.file)
            };

            let arguments = match (entry.arguments, entry.command) {
                (Some(arguments), _) if !arguments.is_empty() => arguments,
                (_, Some(command)) => {
                    let arguments = split_command(&command);
                    if arguments.is_empty() {
                        return Err(LoadError::Malformed {
                            path,
                            message: format!("empty command for {}", file.display()),
                        });
                    }
                    arguments
                }
                _ => {
                    return Err(LoadError::Malformed {
                        path,
                        message: format!(
                            "entry for {} has neither arguments nor command",
                            file.display()
                        ),
                    })
                }
            };

            commands.push(CompileCommand::new(
                entry.directory,
                file,
                arguments,
                entry.output,
            ));
        }

        Ok(Arc::new(JsonDatabase { commands }))
    }
}

#[derive(Debug)]
struct JsonDatabase {
    commands: Vec<CompileCommand>,
}

impl Database for JsonDatabase {
    fn commands_for(&self, file: &Path) -> Vec<CompileCommand> {
        self.commands
            .iter()
            .filter(|command| command.filename == file)
            .cloned()
            .collect()
    }

    fn all_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .commands
            .iter()
            .map(|command| command.filename.clone())
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

/// Splits a `command` string with minimal shell-style quoting rules: single
/// quotes are literal, double quotes allow `\"`/`\\` escapes, and a bare
/// backslash escapes the next character.
fn split_command(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some('\'') => {
                if c == '\'' {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            Some(_) => {
                if c == '"' {
                    quote = None;
                } else if c == '\\' {
                    match chars.next() {
                        Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                        Some(next) => {
                            current.push('\\');
                            current.push(next);
                        }
                        None => current.push('\\'),
                    }
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        in_word = true;
                    }
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
