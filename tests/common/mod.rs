// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write `content` at `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Content used for the stub at a relative path, so tests can predict it.
pub fn stub_content(rel: &str) -> String {
    format!("// stub: {rel}\ndeclare module 'fixture' {{}}\n")
}

/// Scratch layout for one test: definitions tree, install root and cache.
///
/// Keep the struct alive; dropping it removes everything.
pub struct Workspace {
    _dir: TempDir,
    pub definitions: PathBuf,
    pub install: PathBuf,
    pub cache: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            definitions: dir.path().join("definitions"),
            install: dir.path().join("flow-typed"),
            cache: dir.path().join("cache"),
            _dir: dir,
        }
    }

    /// Add a stub at `rel` under the definitions tree.
    pub fn add_stub(&self, rel: &str) -> &Self {
        write_file(&self.definitions, rel, &stub_content(rel));
        self
    }
}

/// A definitions tree modeled on a real one:
///
/// - left-pad with two tool ranges (broad older, newer open-ended)
/// - lib with overlapping caret library ranges
/// - a scoped package
/// - an environment
/// - stray files at the root that the index ignores
pub fn standard_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.add_stub("npm/left-pad_v1.x.x/flow_v0.200.x-/left-pad_v1.x.x.js")
        .add_stub("npm/left-pad_v1.x.x/flow_v0.261.x-/left-pad_v1.x.x.js")
        .add_stub("npm/lib_v^1.0.0/flow_all/lib_v^1.0.0.js")
        .add_stub("npm/lib_v^1.2.0/flow_all/lib_v^1.2.0.js")
        .add_stub("npm/@babel/core_v7.x.x/flow_v0.104.x-/core_v7.x.x.js")
        .add_stub("environments/node/flow_v0.261.x-/node.js");
    write_file(
        &ws.definitions,
        "npm/left-pad_v1.x.x/flow_v0.261.x-/test_left-pad.js",
        "// test file",
    );
    write_file(&ws.definitions, "README.md", "# definitions");
    write_file(&ws.definitions, ".github/workflows/ci.yml", "on: push");
    ws
}
