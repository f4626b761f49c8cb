//! Best-effort fallback command synthesis.

use std::path::Path;

use basalt_core::CompileCommand;

/// Synthesizes an always-valid command for a file nothing knows about.
///
/// Headers are parsed as Objective-C++: the default C interpretation of `.h`
/// produces misleading diagnostics in mixed-language codebases.
pub fn fallback_command(file: &Path) -> CompileCommand {
    let mut arguments = vec![fallback_compiler()];
    if file.extension().is_some_and(|ext| ext == "h") {
        arguments.push("-xobjective-c++-header".to_string());
    }
    arguments.push(file.to_string_lossy().into_owned());

    CompileCommand::new(
        file.parent().unwrap_or_else(|| Path::new("")),
        file,
        arguments,
        // Analysis only; no build artifact is expected.
        None,
    )
}

/// Plain compiler installed next to the running tool.
fn fallback_compiler() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("clang")))
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clang".to_string())
}
