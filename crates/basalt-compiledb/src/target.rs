//! Target inference for dispatching compiler wrappers.
//!
//! `qcc`-style wrappers select the real compiler through a `-V` selector
//! flag; the wrapper's own name says nothing about the target architecture,
//! so analyzing with the wrapper invocation alone picks the host's target
//! defaults. This layer derives the real compiler from the selector, asks it
//! for its target triple (`<compiler> -v` reports a `Target:` line), and
//! injects `-target <triple>` into the resolved command.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, OnceLock};

use basalt_core::{CompileCommand, ProjectInfo};
use regex::Regex;

use crate::{CommandListener, CommandResolver, Subscription};

/// Runs a compiler to capture its self-reported configuration.
pub trait CompilerProbe: Send + Sync + fmt::Debug {
    /// Returns the combined stdout and stderr of `<compiler> -v`.
    fn version_output(&self, compiler: &str) -> std::io::Result<String>;
}

/// Spawns the compiler with output captured through a scoped temporary file.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCompilerProbe;

impl CompilerProbe for DefaultCompilerProbe {
    fn version_output(&self, compiler: &str) -> std::io::Result<String> {
        // Removed on drop, on every exit path.
        let capture = tempfile::NamedTempFile::new()?;
        let stdout = capture.reopen()?;
        // Share one file offset so the streams interleave instead of
        // overwriting each other.
        let stderr = stdout.try_clone()?;

        let status = Command::new(compiler)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()?;
        if !status.success() {
            return Err(std::io::Error::other(format!(
                "`{compiler} -v` exited with {status}"
            )));
        }
        std::fs::read_to_string(capture.path())
    }
}

/// Wrapper executable: optional path prefix, case-insensitive wrapper name,
/// optional Windows suffix.
fn wrapper_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)(?i:qcc)(?:\.exe)?$").expect("valid regex"))
}

/// `-V[<version>,]gcc_<variant>` selector carried by wrapper invocations.
fn selector_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-V(?:(.*),)?gcc_(.*)$").expect("valid regex"))
}

/// Derives the real compiler behind a wrapper invocation, when there is one.
///
/// `qcc -Vgcc_ntoarmv7le` dispatches to `ntoarmv7-gcc`: the variant drops its
/// endianness marker and any `_cpp`/`_gpp` driver marker, the selector's
/// version component (if any) is appended after a dash, and the wrapper's
/// path prefix is kept.
pub(crate) fn derive_real_compiler(arguments: &[String]) -> Option<String> {
    let wrapper = wrapper_regex().captures(arguments.first()?)?;
    let selector = arguments.iter().skip(1).find(|arg| arg.starts_with("-V"))?;
    let selector = selector_regex().captures(selector)?;

    let variant = selector.get(2).map_or("", |m| m.as_str());
    let variant = variant.strip_suffix("le").unwrap_or(variant);
    let variant = variant.strip_suffix("_cpp").unwrap_or(variant);
    let variant = variant.strip_suffix("_gpp").unwrap_or(variant);

    let mut real = String::new();
    real.push_str(wrapper.get(1).map_or("", |m| m.as_str()));
    real.push_str(variant);
    if let Some(version) = selector.get(1).filter(|m| !m.as_str().is_empty()) {
        real.push('-');
        real.push_str(version.as_str());
    }
    real.push_str("-gcc");
    Some(real)
}

/// Returns the triple from the first `Target: ` line of `-v` output.
pub(crate) fn parse_reported_target(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("Target: "))
        .map(|triple| triple.trim().to_string())
}

/// Decorates resolved commands with a `-target` flag inferred by probing the
/// real compiler behind wrapper invocations.
#[derive(Debug)]
pub struct TargetInferringResolver {
    base: Arc<dyn CommandResolver>,
    probe: Arc<dyn CompilerProbe>,
    /// Inferred triple per literal invocation signature (`arguments[0]` as it
    /// appeared); the empty string records "nothing to infer". Never evicted.
    targets: Mutex<HashMap<String, String>>,
    /// Most recent successful inference, reused to decorate fallback
    /// commands. A single value per resolver: sessions mixing target
    /// architectures will see the latest inference win.
    last_target: Mutex<String>,
}

impl TargetInferringResolver {
    pub fn new(base: Arc<dyn CommandResolver>) -> Self {
        Self::with_probe(base, Arc::new(DefaultCompilerProbe))
    }

    pub fn with_probe(base: Arc<dyn CommandResolver>, probe: Arc<dyn CompilerProbe>) -> Self {
        Self {
            base,
            probe,
            targets: Mutex::new(HashMap::new()),
            last_target: Mutex::new(String::new()),
        }
    }

    /// Cached triple for this invocation signature, probing on first access.
    fn target_for(&self, arguments: &[String]) -> String {
        let Some(signature) = arguments.first().cloned() else {
            return String::new();
        };

        if let Some(cached) = self
            .targets
            .lock()
            .expect("target cache mutex poisoned")
            .get(&signature)
        {
            return cached.clone();
        }

        // First sighting: probe outside the lock. Racing probes of one
        // signature are benign; the last insert wins.
        let target = self.infer_target(arguments);
        self.targets
            .lock()
            .expect("target cache mutex poisoned")
            .insert(signature, target.clone());
        target
    }

    fn infer_target(&self, arguments: &[String]) -> String {
        let Some(compiler) = derive_real_compiler(arguments) else {
            return String::new();
        };

        let output = match self.probe.version_output(&compiler) {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!(
                    target = "basalt.compiledb",
                    compiler = %compiler,
                    error = %err,
                    "target probe failed"
                );
                return String::new();
            }
        };

        match parse_reported_target(&output) {
            Some(triple) => triple,
            None => {
                tracing::debug!(
                    target = "basalt.compiledb",
                    compiler = %compiler,
                    "probe output has no Target line"
                );
                String::new()
            }
        }
    }
}

fn insert_target_flag(command: &mut CompileCommand, triple: &str) {
    command.arguments.insert(1, "-target".to_string());
    command.arguments.insert(2, triple.to_string());
}

impl CommandResolver for TargetInferringResolver {
    fn resolve(&self, file: &Path) -> Option<(CompileCommand, ProjectInfo)> {
        let (mut command, project) = self.base.resolve(file)?;
        let triple = self.target_for(&command.arguments);
        if !triple.is_empty() {
            insert_target_flag(&mut command, &triple);
            *self.last_target.lock().expect("last target mutex poisoned") = triple;
        }
        Some((command, project))
    }

    fn fallback(&self, file: &Path) -> CompileCommand {
        let mut command = self.base.fallback(file);
        let triple = self
            .last_target
            .lock()
            .expect("last target mutex poisoned")
            .clone();
        if !triple.is_empty() {
            insert_target_flag(&mut command, &triple);
        }
        command
    }

    fn subscribe(&self, listener: CommandListener) -> Subscription {
        self.base.subscribe(listener)
    }
}
