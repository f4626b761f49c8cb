//! Compile-command resolution for the Basalt analysis pipeline.
//!
//! Analyzing a C/C++ file requires the compiler invocation the build would
//! use for it. This crate layers three sources of truth:
//!
//! - explicit per-file overrides ([`OverlayResolver`]), which take absolute
//!   precedence,
//! - per-directory compilation databases discovered by walking a file's
//!   ancestor directories ([`DirectoryResolver`]),
//! - a synthesized best-effort fallback ([`fallback_command`]), used whenever
//!   the layers above have no answer.
//!
//! [`TargetInferringResolver`] additionally recognizes dispatching compiler
//! wrappers (`qcc`-style), asks the real compiler behind the wrapper for its
//! target triple, and injects `-target` into resolved commands.
//!
//! Layers implement [`CommandResolver`] and compose by wrapping a shared base
//! resolver:
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use basalt_compiledb::{
//!     CommandResolver, DirectoryResolver, OverlayConfig, OverlayResolver,
//!     TargetInferringResolver,
//! };
//!
//! let directory = Arc::new(DirectoryResolver::new(None));
//! let target = Arc::new(TargetInferringResolver::new(directory));
//! let engine = OverlayResolver::new(Some(target), OverlayConfig::default());
//!
//! let file = Path::new("/work/project/src/main.cpp");
//! let command = match engine.resolve(file) {
//!     Some((command, _project)) => command,
//!     None => engine.fallback(file),
//! };
//! # let _ = command;
//! ```
//!
//! All layers are safe to share across threads; each owns its caches behind a
//! mutex held only around lookup-or-insert. Change notifications (`"these
//! files' commands changed"`) are delivered synchronously through
//! [`CommandResolver::subscribe`] and propagate through every layer, so
//! consumers subscribe once at the outermost one.

mod change;
mod directory;
mod fallback;
mod json;
mod loader;
mod overlay;
mod target;

pub use basalt_core::{CompileCommand, ProjectInfo};
pub use change::{ChangeBroadcaster, CommandListener, Subscription};
pub use directory::DirectoryResolver;
pub use fallback::fallback_command;
pub use json::JsonDatabaseLoader;
pub use loader::{Database, DatabaseLoader, LoadError};
pub use overlay::{OverlayConfig, OverlayResolver};
pub use target::{CompilerProbe, DefaultCompilerProbe, TargetInferringResolver};

use std::fmt;
use std::path::Path;

/// A source of compile commands for arbitrary files.
pub trait CommandResolver: Send + Sync + fmt::Debug {
    /// Returns the command used to analyze `file`, plus where it came from.
    ///
    /// `None` means nothing knows the file. That is absence, not an error;
    /// callers are expected to fall back to [`CommandResolver::fallback`].
    fn resolve(&self, file: &Path) -> Option<(CompileCommand, ProjectInfo)>;

    /// Returns a best-effort command for a file nothing knows about.
    ///
    /// Never fails. The default synthesizes a plain-compiler invocation; see
    /// [`fallback_command`].
    fn fallback(&self, file: &Path) -> CompileCommand {
        fallback::fallback_command(file)
    }

    /// Registers `listener` for "these files' commands changed" broadcasts.
    ///
    /// Delivery is synchronous, on the broadcasting thread, in registration
    /// order. The registration lasts until the returned [`Subscription`] is
    /// dropped.
    fn subscribe(&self, listener: CommandListener) -> Subscription;
}
