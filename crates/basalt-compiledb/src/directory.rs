//! Directory-based command resolution.
//!
//! Walks a file's ancestor directories looking for a compilation database,
//! memoizing one load attempt (success or failure) per directory for the
//! process lifetime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use basalt_core::{CompileCommand, ProjectInfo};

use crate::change::ChangeBroadcaster;
use crate::json::JsonDatabaseLoader;
use crate::loader::{Database, DatabaseLoader};
use crate::{CommandListener, CommandResolver, Subscription};

/// Resolves compile commands from per-directory databases.
///
/// With a configured override directory every query is answered from that
/// directory regardless of where the file lives; otherwise the file's
/// ancestors are searched, closest first.
#[derive(Debug)]
pub struct DirectoryResolver {
    loader: Arc<dyn DatabaseLoader>,
    /// When set, all queries resolve against this directory only.
    override_dir: Option<PathBuf>,
    /// One load attempt per directory, memoized for the process lifetime.
    /// `None` records a directory without a usable database. Never evicted.
    databases: Mutex<HashMap<PathBuf, Option<Arc<dyn Database>>>>,
    on_command_changed: ChangeBroadcaster,
}

impl DirectoryResolver {
    /// Resolver backed by `compile_commands.json` databases.
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        Self::with_loader(Arc::new(JsonDatabaseLoader), override_dir)
    }

    pub fn with_loader(loader: Arc<dyn DatabaseLoader>, override_dir: Option<PathBuf>) -> Self {
        Self {
            loader,
            override_dir,
            databases: Mutex::new(HashMap::new()),
            on_command_changed: ChangeBroadcaster::new(),
        }
    }

    /// Returns the database for `dir`, loading it on first access.
    fn database_in(&self, dir: &Path) -> Option<Arc<dyn Database>> {
        {
            let databases = self.databases.lock().expect("database cache mutex poisoned");
            if let Some(cached) = databases.get(dir) {
                return cached.clone();
            }
        }

        // First access: load outside the lock. Two racing loads of the same
        // directory are benign; the last insert wins and entries are never
        // evicted.
        let loaded = match self.loader.load(dir) {
            Ok(db) => Some(db),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                tracing::warn!(
                    target = "basalt.compiledb",
                    dir = %dir.display(),
                    error = %err,
                    "failed to load compilation database"
                );
                None
            }
        };

        self.databases
            .lock()
            .expect("database cache mutex poisoned")
            .insert(dir.to_path_buf(), loaded.clone());

        // Every file in a freshly loaded database just gained a real command.
        if let Some(db) = &loaded {
            self.on_command_changed.broadcast(&db.all_files());
        }
        loaded
    }

    /// Finds the database answering for `file`, plus the directory it lives in.
    fn database_for(&self, file: &Path) -> Option<(Arc<dyn Database>, PathBuf)> {
        debug_assert!(file.is_absolute(), "query paths must be absolute");

        if let Some(dir) = &self.override_dir {
            return self.database_in(dir).map(|db| (db, dir.clone()));
        }

        let mut dir = file.parent();
        while let Some(current) = dir {
            if let Some(db) = self.database_in(current) {
                return Some((db, current.to_path_buf()));
            }
            dir = current.parent();
        }
        None
    }
}

impl CommandResolver for DirectoryResolver {
    fn resolve(&self, file: &Path) -> Option<(CompileCommand, ProjectInfo)> {
        let Some((db, source_root)) = self.database_for(file) else {
            tracing::debug!(
                target = "basalt.compiledb",
                file = %file.display(),
                "no compilation database found"
            );
            return None;
        };

        let mut candidates = db.commands_for(file);
        if candidates.is_empty() {
            return None;
        }
        // Databases may report several entries for one file; the first wins.
        Some((
            candidates.swap_remove(0),
            ProjectInfo {
                source_root: Some(source_root),
            },
        ))
    }

    fn subscribe(&self, listener: CommandListener) -> Subscription {
        self.on_command_changed.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn write_database(dir: &Path, files: &[&Path]) {
        let entries: Vec<serde_json::Value> = files
            .iter()
            .map(|file| {
                serde_json::json!({
                    "directory": dir,
                    "file": file,
                    "arguments": ["clang++", "-c", file],
                })
            })
            .collect();
        fs::write(
            dir.join(crate::json::DATABASE_FILE),
            serde_json::to_vec(&entries).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn closest_ancestor_database_wins() {
        let temp = tempfile::tempdir().unwrap();
        let outer = temp.path().join("a");
        let inner = outer.join("b");
        let nested = inner.join("c");
        fs::create_dir_all(&nested).unwrap();

        let file = nested.join("x.cpp");
        write_database(&outer, &[&file]);
        write_database(&inner, &[&file]);

        let resolver = DirectoryResolver::new(None);
        let (_, project) = resolver.resolve(&file).expect("file is in both databases");
        assert_eq!(project.source_root.as_deref(), Some(inner.as_path()));
    }

    #[test]
    fn override_directory_wins_over_ancestors() {
        let temp = tempfile::tempdir().unwrap();
        let project = temp.path().join("proj");
        let elsewhere = temp.path().join("build");
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(&elsewhere).unwrap();

        let file = project.join("x.cpp");
        write_database(&project, &[&file]);
        write_database(&elsewhere, &[&file]);

        let resolver = DirectoryResolver::new(Some(elsewhere.clone()));
        let (_, info) = resolver.resolve(&file).expect("override directory has the file");
        assert_eq!(info.source_root.as_deref(), Some(elsewhere.as_path()));
    }

    #[test]
    fn file_missing_from_every_database_is_absent() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("proj");
        fs::create_dir_all(&dir).unwrap();
        write_database(&dir, &[&dir.join("known.cpp")]);

        let resolver = DirectoryResolver::new(None);
        assert!(resolver.resolve(&dir.join("unknown.cpp")).is_none());
    }

    #[test]
    fn fresh_load_broadcasts_known_files() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("proj");
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("x.cpp");
        write_database(&dir, &[&file]);

        let resolver = DirectoryResolver::new(None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = resolver.subscribe(Box::new(move |paths| {
            sink.lock().unwrap().extend_from_slice(paths);
        }));

        resolver.resolve(&file).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![file.clone()]);

        // Cached on the second query: no further broadcast.
        resolver.resolve(&file).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
