//! End-to-end target inference against a real (scripted) compiler.

#![cfg(unix)]

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use basalt_compiledb::{
    ChangeBroadcaster, CommandListener, CommandResolver, CompileCommand, ProjectInfo,
    Subscription, TargetInferringResolver,
};

#[derive(Debug)]
struct StaticResolver {
    commands: HashMap<PathBuf, CompileCommand>,
    changes: ChangeBroadcaster,
}

impl StaticResolver {
    fn with_command(file: impl Into<PathBuf>, command: CompileCommand) -> Self {
        let mut commands = HashMap::new();
        commands.insert(file.into(), command);
        Self {
            commands,
            changes: ChangeBroadcaster::new(),
        }
    }
}

impl CommandResolver for StaticResolver {
    fn resolve(&self, file: &Path) -> Option<(CompileCommand, ProjectInfo)> {
        let command = self.commands.get(file).cloned()?;
        Some((command, ProjectInfo::default()))
    }

    fn subscribe(&self, listener: CommandListener) -> Subscription {
        self.changes.subscribe(listener)
    }
}

fn args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn write_compiler_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

#[test]
fn probes_the_derived_compiler_for_its_target() {
    let temp = tempfile::tempdir().unwrap();
    // The wrapper's path prefix carries over to the derived compiler, so the
    // scripted `ntoarmv7-gcc` sits next to the (nonexistent) wrapper.
    write_compiler_script(
        &temp.path().join("ntoarmv7-gcc"),
        "#!/bin/sh\n\
         echo 'Using built-in specs.' 1>&2\n\
         echo 'Target: arm-unknown-nto-qnx7.1.0eabi' 1>&2\n",
    );

    let wrapper = temp.path().join("qcc");
    let file = PathBuf::from("/proj/a.cpp");
    let base = StaticResolver::with_command(
        &file,
        CompileCommand::new(
            "/proj",
            &file,
            vec![
                wrapper.to_string_lossy().into_owned(),
                "-Vgcc_ntoarmv7le".to_string(),
                "-c".to_string(),
                "a.cpp".to_string(),
            ],
            None,
        ),
    );

    let resolver = TargetInferringResolver::new(Arc::new(base));
    let (command, _) = resolver.resolve(&file).unwrap();
    assert_eq!(
        &command.arguments[1..3],
        &args(&["-target", "arm-unknown-nto-qnx7.1.0eabi"])[..]
    );
}

#[test]
fn unrunnable_derived_compiler_degrades_to_no_target() {
    let temp = tempfile::tempdir().unwrap();
    let wrapper = temp.path().join("qcc");

    let file = PathBuf::from("/proj/a.cpp");
    let original = vec![
        wrapper.to_string_lossy().into_owned(),
        "-Vgcc_ntoarmv7le".to_string(),
        "-c".to_string(),
        "a.cpp".to_string(),
    ];
    let base = StaticResolver::with_command(
        &file,
        CompileCommand::new("/proj", &file, original.clone(), None),
    );

    // No `ntoarmv7-gcc` exists next to the wrapper: the spawn fails and the
    // command comes back unchanged, still usable.
    let resolver = TargetInferringResolver::new(Arc::new(base));
    let (command, _) = resolver.resolve(&file).unwrap();
    assert_eq!(command.arguments, original);
}

#[test]
fn nonzero_probe_exit_degrades_to_no_target() {
    let temp = tempfile::tempdir().unwrap();
    write_compiler_script(
        &temp.path().join("ntoarmv7-gcc"),
        "#!/bin/sh\n\
         echo 'Target: arm-unknown-nto-qnx7.1.0eabi' 1>&2\n\
         exit 1\n",
    );

    let wrapper = temp.path().join("qcc");
    let file = PathBuf::from("/proj/a.cpp");
    let original = vec![
        wrapper.to_string_lossy().into_owned(),
        "-Vgcc_ntoarmv7le".to_string(),
    ];
    let base = StaticResolver::with_command(
        &file,
        CompileCommand::new("/proj", &file, original.clone(), None),
    );

    let resolver = TargetInferringResolver::new(Arc::new(base));
    let (command, _) = resolver.resolve(&file).unwrap();
    assert_eq!(command.arguments, original);
}
