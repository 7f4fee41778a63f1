// src/definitions/mod.rs

//! Definitions index
//!
//! Scans a definitions tree once and turns its directory names into typed
//! [`DefinitionEntry`] records. The tree layout is:
//!
//! ```text
//! <root>/npm/<name>_v<lib>/flow_<tool>/<name>_v<lib>.js
//! <root>/npm/@<scope>/<name>_v<lib>/flow_<tool>/<name>_v<lib>.js
//! <root>/environments/<env>/flow_<tool>/<env>.js
//! ```
//!
//! `test_*` files next to a stub are recorded but never installed.
//!
//! A corrupt tree fails the whole build: unparseable names, missing stubs,
//! stray files, and duplicate `(library range, tool range)` pairs for one
//! package are all errors. Nothing is skipped silently.

pub mod naming;

use crate::hash::Fingerprint;
use crate::version::VersionRange;
use naming::NamingError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory holding npm package definitions
pub const NPM_DIR: &str = "npm";
/// Directory holding environment (global) definitions
pub const ENVIRONMENTS_DIR: &str = "environments";
/// Prefix for test files that sit next to a stub
const TEST_FILE_PREFIX: &str = "test_";
/// Extension of stub files
const STUB_EXTENSION: &str = "js";

/// Index build errors
#[derive(Error, Debug)]
pub enum IndexBuildError {
    #[error("definitions root {0} does not exist or is not a directory")]
    MissingRoot(PathBuf),

    #[error("cannot parse {path}: {source}")]
    Naming {
        path: PathBuf,
        #[source]
        source: NamingError,
    },

    #[error("{0} has no flow_* directories; every definition needs an explicit tool range")]
    MissingToolRange(PathBuf),

    #[error("{dir} has no stub file named {expected}")]
    MissingStub { dir: PathBuf, expected: String },

    #[error("unexpected entry in definitions tree: {0}")]
    UnexpectedEntry(PathBuf),

    #[error(
        "duplicate definition for {package}: {first} and {second} declare the same library range ({library_range}) and tool range ({tool_range})"
    )]
    Duplicate {
        package: String,
        library_range: String,
        tool_range: String,
        first: String,
        second: String,
    },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IndexBuildError {
    fn naming(path: &Path, source: NamingError) -> Self {
        Self::Naming {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where a definition applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DefinitionScope {
    /// Declares globals for a runtime environment (node, dom, ...)
    EnvironmentGlobal,
    /// Declares the module of one npm package
    ScopedToPackage,
}

impl fmt::Display for DefinitionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionScope::EnvironmentGlobal => write!(f, "environment"),
            DefinitionScope::ScopedToPackage => write!(f, "package"),
        }
    }
}

/// One stub file and the version ranges it was written for
#[derive(Debug, Clone)]
pub struct DefinitionEntry {
    /// Package name, including the npm scope (`@babel/core`), or environment name
    pub package_name: String,
    pub library_range: VersionRange,
    pub tool_range: VersionRange,
    pub scope: DefinitionScope,
    /// Absolute path of the stub file
    pub file_path: PathBuf,
    /// Path of the stub relative to the definitions root, `/`-separated
    pub relative_path: String,
    /// SHA-256 of the stub content at scan time
    pub fingerprint: Fingerprint,
    /// Library range as written in the directory name (`1.x.x`); empty for environments
    pub version_label: String,
    /// Tool directory name (`flow_v0.104.x-`)
    pub tool_label: String,
    /// `test_*` files next to the stub
    pub test_files: Vec<PathBuf>,
}

impl DefinitionEntry {
    /// Install location relative to the install root
    ///
    /// - packages: `npm/<name>_v<lib>.js` (`npm/@scope/<name>_v<lib>.js`)
    /// - environments: `environments/<env>.js`
    pub fn install_path(&self) -> PathBuf {
        match self.scope {
            DefinitionScope::ScopedToPackage => PathBuf::from(NPM_DIR).join(format!(
                "{}_v{}.{}",
                self.package_name, self.version_label, STUB_EXTENSION
            )),
            DefinitionScope::EnvironmentGlobal => PathBuf::from(ENVIRONMENTS_DIR)
                .join(format!("{}.{}", self.package_name, STUB_EXTENSION)),
        }
    }

    /// Short identifier for reports: `left-pad_v1.x.x/flow_v0.104.x-`
    pub fn id(&self) -> String {
        match self.scope {
            DefinitionScope::ScopedToPackage => format!(
                "{}_v{}/{}",
                self.package_name, self.version_label, self.tool_label
            ),
            DefinitionScope::EnvironmentGlobal => {
                format!("{}/{}", self.package_name, self.tool_label)
            }
        }
    }
}

/// Lookup key: the same name may exist as both an environment and a package
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct DefinitionKey {
    scope: DefinitionScope,
    name: String,
}

/// Two entries for one package whose ranges overlap without being identical
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub package_name: String,
    pub first: String,
    pub second: String,
}

/// Read-only catalog of every definition in a tree
#[derive(Debug, Default)]
pub struct DefinitionIndex {
    root: PathBuf,
    entries: BTreeMap<DefinitionKey, Vec<DefinitionEntry>>,
}

impl DefinitionIndex {
    /// Scan `root` and build the index
    pub fn build(root: &Path) -> Result<Self, IndexBuildError> {
        if !root.is_dir() {
            return Err(IndexBuildError::MissingRoot(root.to_path_buf()));
        }

        let mut index = Self {
            root: root.to_path_buf(),
            entries: BTreeMap::new(),
        };

        for category in sorted_children(root)? {
            let path = category.path();
            if !category.file_type().is_dir() {
                debug!("Ignoring file at definitions root: {}", path.display());
                continue;
            }

            match category.file_name().to_str() {
                Some(NPM_DIR) => index.scan_npm(path)?,
                Some(ENVIRONMENTS_DIR) => index.scan_environments(path)?,
                _ => debug!("Ignoring unknown definitions category: {}", path.display()),
            }
        }

        info!(
            "Indexed {} definitions for {} names from {}",
            index.len(),
            index.entries.len(),
            root.display()
        );
        Ok(index)
    }

    /// Build an index from already-parsed entries
    ///
    /// Applies the same duplicate check as a directory scan.
    pub fn from_entries(
        root: &Path,
        entries: impl IntoIterator<Item = DefinitionEntry>,
    ) -> Result<Self, IndexBuildError> {
        let mut index = Self {
            root: root.to_path_buf(),
            entries: BTreeMap::new(),
        };
        for entry in entries {
            index.insert(entry)?;
        }
        Ok(index)
    }

    /// Package entries for `package_name`, in scan order; empty when unknown
    pub fn lookup(&self, package_name: &str) -> &[DefinitionEntry] {
        self.lookup_scoped(DefinitionScope::ScopedToPackage, package_name)
    }

    /// Environment entries for `env_name`, in scan order; empty when unknown
    pub fn lookup_environment(&self, env_name: &str) -> &[DefinitionEntry] {
        self.lookup_scoped(DefinitionScope::EnvironmentGlobal, env_name)
    }

    /// Entries for a name within a scope
    pub fn lookup_scoped(&self, scope: DefinitionScope, name: &str) -> &[DefinitionEntry] {
        let key = DefinitionKey {
            scope,
            name: name.to_string(),
        };
        self.entries.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every entry, grouped by name
    pub fn iter(&self) -> impl Iterator<Item = &DefinitionEntry> {
        self.entries.values().flatten()
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct names within a scope
    pub fn name_count(&self, scope: DefinitionScope) -> usize {
        self.entries.keys().filter(|k| k.scope == scope).count()
    }

    /// Root the index was built from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pairs of entries whose library and tool ranges both intersect
    ///
    /// These are legal but may resolve as ambiguous for some requests.
    pub fn overlaps(&self) -> Vec<Overlap> {
        let mut found = Vec::new();
        for entries in self.entries.values() {
            for (i, a) in entries.iter().enumerate() {
                for b in &entries[i + 1..] {
                    if a.library_range.intersects(&b.library_range)
                        && a.tool_range.intersects(&b.tool_range)
                    {
                        found.push(Overlap {
                            package_name: a.package_name.clone(),
                            first: a.relative_path.clone(),
                            second: b.relative_path.clone(),
                        });
                    }
                }
            }
        }
        found
    }

    fn scan_npm(&mut self, npm_dir: &Path) -> Result<(), IndexBuildError> {
        for child in sorted_children(npm_dir)? {
            let path = child.path();
            if !child.file_type().is_dir() {
                return Err(IndexBuildError::UnexpectedEntry(path.to_path_buf()));
            }

            let name = utf8_name(&child)?;
            if name.starts_with('@') {
                let scope = naming::parse_scope(name).map_err(|e| IndexBuildError::naming(path, e))?;
                for scoped in sorted_children(path)? {
                    if !scoped.file_type().is_dir() {
                        return Err(IndexBuildError::UnexpectedEntry(scoped.path().to_path_buf()));
                    }
                    self.scan_package(scoped.path(), utf8_name(&scoped)?, Some(scope.as_str()))?;
                }
            } else {
                self.scan_package(path, name, None)?;
            }
        }
        Ok(())
    }

    fn scan_package(
        &mut self,
        dir: &Path,
        dir_name: &str,
        scope: Option<&str>,
    ) -> Result<(), IndexBuildError> {
        let segment =
            naming::parse_package_segment(dir_name).map_err(|e| IndexBuildError::naming(dir, e))?;
        let package_name = match scope {
            Some(scope) => format!("{}/{}", scope, segment.name),
            None => segment.name.clone(),
        };
        let stub_name = format!("{}.{}", dir_name, STUB_EXTENSION);

        for (tool, stub, tests) in scan_tool_dirs(dir, &stub_name)? {
            let entry = self.make_entry(
                package_name.clone(),
                segment.library_range.clone(),
                segment.version_label.clone(),
                DefinitionScope::ScopedToPackage,
                tool,
                stub,
                tests,
            )?;
            self.insert(entry)?;
        }
        Ok(())
    }

    fn scan_environments(&mut self, env_root: &Path) -> Result<(), IndexBuildError> {
        for child in sorted_children(env_root)? {
            let path = child.path();
            if !child.file_type().is_dir() {
                return Err(IndexBuildError::UnexpectedEntry(path.to_path_buf()));
            }

            let env_name = utf8_name(&child)?;
            if !naming::is_valid_name(env_name) {
                return Err(IndexBuildError::naming(
                    path,
                    NamingError::InvalidName(env_name.to_string()),
                ));
            }
            let stub_name = format!("{}.{}", env_name, STUB_EXTENSION);

            for (tool, stub, tests) in scan_tool_dirs(path, &stub_name)? {
                // Environments are unversioned: the library range is explicitly `*`
                let entry = self.make_entry(
                    env_name.to_string(),
                    VersionRange::any(),
                    String::new(),
                    DefinitionScope::EnvironmentGlobal,
                    tool,
                    stub,
                    tests,
                )?;
                self.insert(entry)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn make_entry(
        &self,
        package_name: String,
        library_range: VersionRange,
        version_label: String,
        scope: DefinitionScope,
        tool: naming::ToolSegment,
        stub: PathBuf,
        test_files: Vec<PathBuf>,
    ) -> Result<DefinitionEntry, IndexBuildError> {
        let fingerprint = Fingerprint::of_file(&stub).map_err(|source| IndexBuildError::Io {
            path: stub.clone(),
            source,
        })?;

        let relative_path = stub
            .strip_prefix(&self.root)
            .unwrap_or(&stub)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(DefinitionEntry {
            package_name,
            library_range,
            tool_range: tool.tool_range,
            scope,
            file_path: stub,
            relative_path,
            fingerprint,
            version_label,
            tool_label: tool.label,
            test_files,
        })
    }

    fn insert(&mut self, entry: DefinitionEntry) -> Result<(), IndexBuildError> {
        let key = DefinitionKey {
            scope: entry.scope,
            name: entry.package_name.clone(),
        };
        let existing = self.entries.entry(key).or_default();

        if let Some(clash) = existing.iter().find(|e| {
            e.library_range == entry.library_range && e.tool_range == entry.tool_range
        }) {
            return Err(IndexBuildError::Duplicate {
                package: entry.package_name.clone(),
                library_range: entry.library_range.to_string(),
                tool_range: entry.tool_range.to_string(),
                first: clash.relative_path.clone(),
                second: entry.relative_path.clone(),
            });
        }

        for other in existing.iter() {
            if other.library_range.intersects(&entry.library_range)
                && other.tool_range.intersects(&entry.tool_range)
            {
                warn!(
                    "Overlapping definitions for {}: {} and {}",
                    entry.package_name, other.relative_path, entry.relative_path
                );
            }
        }

        debug!("Indexed {}", entry.relative_path);
        existing.push(entry);
        Ok(())
    }
}

/// Scan the `flow_*` directories under a package or environment directory
///
/// Returns `(tool segment, stub path, test files)` per tool directory.
fn scan_tool_dirs(
    dir: &Path,
    stub_name: &str,
) -> Result<Vec<(naming::ToolSegment, PathBuf, Vec<PathBuf>)>, IndexBuildError> {
    let mut found = Vec::new();

    for child in sorted_children(dir)? {
        let path = child.path();
        if !child.file_type().is_dir() {
            return Err(IndexBuildError::UnexpectedEntry(path.to_path_buf()));
        }

        let tool = naming::parse_tool_segment(utf8_name(&child)?)
            .map_err(|e| IndexBuildError::naming(path, e))?;

        let mut stub = None;
        let mut tests = Vec::new();
        for file in sorted_children(path)? {
            let file_name = utf8_name(&file)?;
            if !file.file_type().is_file() {
                return Err(IndexBuildError::UnexpectedEntry(file.path().to_path_buf()));
            }
            if file_name == stub_name {
                stub = Some(file.path().to_path_buf());
            } else if file_name.starts_with(TEST_FILE_PREFIX) {
                tests.push(file.path().to_path_buf());
            } else {
                return Err(IndexBuildError::UnexpectedEntry(file.path().to_path_buf()));
            }
        }

        let stub = stub.ok_or_else(|| IndexBuildError::MissingStub {
            dir: path.to_path_buf(),
            expected: stub_name.to_string(),
        })?;
        found.push((tool, stub, tests));
    }

    if found.is_empty() {
        return Err(IndexBuildError::MissingToolRange(dir.to_path_buf()));
    }
    Ok(found)
}

/// Immediate children of `dir`, sorted by file name for a deterministic scan
fn sorted_children(dir: &Path) -> Result<Vec<walkdir::DirEntry>, IndexBuildError> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            IndexBuildError::Io {
                path,
                source: e.into(),
            }
        })
}

fn utf8_name(entry: &walkdir::DirEntry) -> Result<&str, IndexBuildError> {
    entry
        .file_name()
        .to_str()
        .ok_or_else(|| IndexBuildError::UnexpectedEntry(entry.path().to_path_buf()))
}
