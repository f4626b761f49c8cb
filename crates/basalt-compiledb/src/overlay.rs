//! Explicit per-file command overrides layered over a base resolver.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use basalt_core::{CompileCommand, ProjectInfo};

use crate::change::ChangeBroadcaster;
use crate::fallback;
use crate::{CommandListener, CommandResolver, Subscription};

/// Configuration for [`OverlayResolver`].
#[derive(Debug, Clone, Default)]
pub struct OverlayConfig {
    /// Flags appended to every fallback command.
    pub fallback_flags: Vec<String>,
    /// Compiler resource directory injected into resolved commands. When
    /// unset it is derived from the running tool's install layout.
    pub resource_dir: Option<String>,
}

/// The outermost resolution layer.
///
/// Explicit per-file overrides take absolute precedence over the wrapped
/// base, and every produced command is post-processed: plugin-loading flags
/// are stripped and the resource directory is injected. Base change
/// notifications are re-broadcast, so consumers subscribe here once.
#[derive(Debug)]
pub struct OverlayResolver {
    base: Option<Arc<dyn CommandResolver>>,
    resource_dir: Option<String>,
    fallback_flags: Vec<String>,
    /// Explicit overrides, independent of any database.
    commands: Mutex<HashMap<PathBuf, CompileCommand>>,
    on_command_changed: ChangeBroadcaster,
    /// Keeps the re-broadcast wiring to the base alive.
    _base_changes: Option<Subscription>,
}

impl OverlayResolver {
    pub fn new(base: Option<Arc<dyn CommandResolver>>, config: OverlayConfig) -> Self {
        let on_command_changed = ChangeBroadcaster::new();
        let _base_changes = base.as_ref().map(|base| {
            let rebroadcast = on_command_changed.clone();
            base.subscribe(Box::new(move |paths| rebroadcast.broadcast(paths)))
        });
        Self {
            base,
            resource_dir: config.resource_dir.or_else(default_resource_dir),
            fallback_flags: config.fallback_flags,
            commands: Mutex::new(HashMap::new()),
            on_command_changed,
            _base_changes,
        }
    }

    /// Sets or clears the override for `file`, then broadcasts the change.
    ///
    /// Clearing an override that was never set still broadcasts.
    pub fn set_compile_command(&self, file: &Path, command: Option<CompileCommand>) {
        {
            let mut commands = self.commands.lock().expect("override map mutex poisoned");
            match command {
                Some(command) => {
                    commands.insert(file.to_path_buf(), command);
                }
                None => {
                    commands.remove(file);
                }
            }
        }
        self.on_command_changed.broadcast(&[file.to_path_buf()]);
    }

    fn adjust(&self, command: &mut CompileCommand) {
        strip_plugin_arguments(&mut command.arguments);
        if let Some(resource_dir) = &self.resource_dir {
            if !has_resource_dir(&command.arguments) {
                command.arguments.push(format!("-resource-dir={resource_dir}"));
            }
        }
    }
}

impl CommandResolver for OverlayResolver {
    fn resolve(&self, file: &Path) -> Option<(CompileCommand, ProjectInfo)> {
        let overridden = {
            let commands = self.commands.lock().expect("override map mutex poisoned");
            commands.get(file).cloned()
        };

        let (mut command, project) = match overridden {
            Some(command) => (command, ProjectInfo { source_root: None }),
            None => self.base.as_ref()?.resolve(file)?,
        };
        self.adjust(&mut command);
        Some((command, project))
    }

    fn fallback(&self, file: &Path) -> CompileCommand {
        let mut command = match &self.base {
            Some(base) => base.fallback(file),
            None => fallback::fallback_command(file),
        };
        command
            .arguments
            .extend(self.fallback_flags.iter().cloned());
        command
    }

    fn subscribe(&self, listener: CommandListener) -> Subscription {
        self.on_command_changed.subscribe(listener)
    }
}

/// Removes plugin-loading argument groups:
/// `-Xclang {-load|-plugin|-plugin-arg-*|-add-plugin} -Xclang <arg>`.
///
/// The analyzer cannot host compiler plugins.
fn strip_plugin_arguments(arguments: &mut Vec<String>) {
    let mut kept = Vec::with_capacity(arguments.len());
    let mut i = 0;
    while i < arguments.len() {
        // Never consumes the trailing input path.
        if i + 4 < arguments.len()
            && arguments[i] == "-Xclang"
            && is_plugin_flag(&arguments[i + 1])
            && arguments[i + 2] == "-Xclang"
        {
            i += 4;
            continue;
        }
        kept.push(std::mem::take(&mut arguments[i]));
        i += 1;
    }
    *arguments = kept;
}

fn is_plugin_flag(flag: &str) -> bool {
    flag == "-load"
        || flag == "-plugin"
        || flag == "-add-plugin"
        || flag.starts_with("-plugin-arg-")
}

fn has_resource_dir(arguments: &[String]) -> bool {
    arguments
        .iter()
        .any(|arg| arg == "-resource-dir" || arg.starts_with("-resource-dir="))
}

/// Resource directory shipped alongside the running tool
/// (`<exe-dir>/../lib/clang`).
fn default_resource_dir() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    let install_root = exe.parent()?.parent()?;
    Some(
        install_root
            .join("lib")
            .join("clang")
            .to_string_lossy()
            .into_owned(),
    )
}
