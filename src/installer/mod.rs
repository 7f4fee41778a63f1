// src/installer/mod.rs

//! Writing stubs into a consumer project
//!
//! Each resolved entry maps to one file under the install root (see
//! [`DefinitionEntry::install_path`]). Content is written verbatim:
//!
//! - same content already there: nothing is written, reported up to date
//! - different content there: reported as would-overwrite unless `force`
//! - nothing there: written
//!
//! Writes go to a temporary file in the target directory and are renamed into
//! place, so an interrupted install never leaves a half-written stub.

pub mod path;

use crate::definitions::DefinitionEntry;
use crate::hash::Fingerprint;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Installation failures
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("install path {0} would escape the install root")]
    UnsafePath(PathBuf),

    #[error("{0} exists and is not a regular file")]
    NotAFile(PathBuf),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    fn write(path: &Path, source: io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What `install` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    /// New file written
    Installed,
    /// Different content replaced because `force` was set
    Overwritten,
    /// Identical content already present; nothing written
    UpToDate,
    /// Different content present and `force` not set; nothing written
    WouldOverwrite,
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallStatus::Installed => "installed",
            InstallStatus::Overwritten => "overwritten",
            InstallStatus::UpToDate => "already up to date",
            InstallStatus::WouldOverwrite => "would overwrite",
        };
        write!(f, "{s}")
    }
}

/// Result of one install call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub status: InstallStatus,
    /// Absolute target path
    pub target: PathBuf,
    /// Fingerprint of the content that was (or would have been) written
    pub fingerprint: Fingerprint,
    /// Fingerprint of what was on disk before, if anything
    pub previous: Option<Fingerprint>,
}

/// Fingerprints of stub files already under the install root
#[derive(Debug, Clone, Default)]
pub struct ExistingFiles {
    by_path: HashMap<PathBuf, Fingerprint>,
}

impl ExistingFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file, keyed by its path relative to the install root
    pub fn insert(&mut self, relative: impl Into<PathBuf>, fingerprint: Fingerprint) {
        self.by_path.insert(relative.into(), fingerprint);
    }

    pub fn get(&self, relative: &Path) -> Option<&Fingerprint> {
        self.by_path.get(relative)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Writes stubs under one install root
#[derive(Debug, Clone)]
pub struct Installer {
    root: PathBuf,
    force: bool,
}

impl Installer {
    pub fn new(root: impl AsRef<Path>, force: bool) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            force,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn force(&self) -> bool {
        self.force
    }

    /// Fingerprint every regular file currently under the install root
    ///
    /// A missing root yields an empty set.
    pub fn scan_existing(&self) -> Result<ExistingFiles, InstallError> {
        let mut existing = ExistingFiles::new();
        if !self.root.exists() {
            return Ok(existing);
        }

        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| InstallError::Read {
                path: e.path().unwrap_or(&self.root).to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let fingerprint = Fingerprint::of_file(path).map_err(|source| InstallError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            if let Ok(relative) = path.strip_prefix(&self.root) {
                existing.insert(relative, fingerprint);
            }
        }

        debug!(
            "Found {} existing files under {}",
            existing.len(),
            self.root.display()
        );
        Ok(existing)
    }

    /// Install `content` for `entry`
    ///
    /// `existing` is consulted first; a path it does not know about is checked
    /// on disk, so files created after the scan are never clobbered silently.
    pub fn install(
        &self,
        entry: &DefinitionEntry,
        content: &[u8],
        existing: &ExistingFiles,
    ) -> Result<InstallReport, InstallError> {
        let relative = path::sanitize_relative(&entry.install_path())?;
        let target = path::safe_join(&self.root, &relative)?;
        let fingerprint = Fingerprint::of(content);

        let previous = match existing.get(&relative) {
            Some(fp) => Some(fp.clone()),
            None => self.fingerprint_on_disk(&target)?,
        };

        let status = match &previous {
            Some(old) if *old == fingerprint => {
                debug!("{} already up to date", target.display());
                InstallStatus::UpToDate
            }
            Some(old) if !self.force => {
                warn!(
                    "{} has local changes ({} != {}), not overwriting",
                    target.display(),
                    old.short(),
                    fingerprint.short()
                );
                InstallStatus::WouldOverwrite
            }
            Some(_) => {
                write_atomic(&target, content)?;
                info!("Overwrote {}", target.display());
                InstallStatus::Overwritten
            }
            None => {
                write_atomic(&target, content)?;
                info!("Installed {}", target.display());
                InstallStatus::Installed
            }
        };

        Ok(InstallReport {
            status,
            target,
            fingerprint,
            previous,
        })
    }

    fn fingerprint_on_disk(&self, target: &Path) -> Result<Option<Fingerprint>, InstallError> {
        match fs::symlink_metadata(target) {
            Ok(meta) if meta.is_file() => Fingerprint::of_file(target)
                .map(Some)
                .map_err(|source| InstallError::Read {
                    path: target.to_path_buf(),
                    source,
                }),
            Ok(_) => Err(InstallError::NotAFile(target.to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(InstallError::Read {
                path: target.to_path_buf(),
                source,
            }),
        }
    }
}

/// Write `content` to `target` via a temp file in the same directory
fn write_atomic(target: &Path, content: &[u8]) -> Result<(), InstallError> {
    let parent = target
        .parent()
        .ok_or_else(|| InstallError::UnsafePath(target.to_path_buf()))?;

    // create_dir_all tolerates directories that already exist or appear concurrently
    fs::create_dir_all(parent).map_err(|e| InstallError::write(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| InstallError::write(target, e))?;
    temp.write_all(content)
        .map_err(|e| InstallError::write(target, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| InstallError::write(target, e))?;
    temp.persist(target)
        .map_err(|e| InstallError::write(target, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::DefinitionScope;
    use crate::version::VersionRange;
    use tempfile::TempDir;

    const STUB: &[u8] = b"declare module 'left-pad' { declare module.exports: any; }";

    fn entry(name: &str, scope: DefinitionScope) -> DefinitionEntry {
        DefinitionEntry {
            package_name: name.to_string(),
            library_range: VersionRange::parse("1.x.x").unwrap(),
            tool_range: VersionRange::any(),
            scope,
            file_path: PathBuf::from("/defs/stub.js"),
            relative_path: format!("npm/{name}_v1.x.x/flow_all/{name}_v1.x.x.js"),
            fingerprint: Fingerprint::of(STUB),
            version_label: "1.x.x".to_string(),
            tool_label: "flow_all".to_string(),
            test_files: Vec::new(),
        }
    }

    #[test]
    fn test_fresh_install() {
        let dir = TempDir::new().unwrap();
        let installer = Installer::new(dir.path(), false);
        let report = installer
            .install(&entry("left-pad", DefinitionScope::ScopedToPackage), STUB, &ExistingFiles::new())
            .unwrap();

        assert_eq!(report.status, InstallStatus::Installed);
        assert_eq!(report.target, dir.path().join("npm/left-pad_v1.x.x.js"));
        assert_eq!(fs::read(&report.target).unwrap(), STUB);
        assert!(report.previous.is_none());
    }

    #[test]
    fn test_scoped_and_environment_targets() {
        let dir = TempDir::new().unwrap();
        let installer = Installer::new(dir.path(), false);
        let none = ExistingFiles::new();

        let scoped = installer
            .install(&entry("@babel/core", DefinitionScope::ScopedToPackage), STUB, &none)
            .unwrap();
        assert_eq!(scoped.target, dir.path().join("npm/@babel/core_v1.x.x.js"));

        let env = installer
            .install(&entry("node", DefinitionScope::EnvironmentGlobal), STUB, &none)
            .unwrap();
        assert_eq!(env.target, dir.path().join("environments/node.js"));
    }

    #[test]
    fn test_second_install_is_up_to_date_without_writing() {
        let dir = TempDir::new().unwrap();
        let installer = Installer::new(dir.path(), false);
        let e = entry("left-pad", DefinitionScope::ScopedToPackage);

        let first = installer.install(&e, STUB, &installer.scan_existing().unwrap()).unwrap();
        let before = fs::metadata(&first.target).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        let second = installer.install(&e, STUB, &installer.scan_existing().unwrap()).unwrap();
        let after = fs::metadata(&second.target).unwrap().modified().unwrap();

        assert_eq!(second.status, InstallStatus::UpToDate);
        assert_eq!(before, after);
    }

    #[test]
    fn test_local_changes_not_overwritten_without_force() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("npm/left-pad_v1.x.x.js");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, b"// hand edited").unwrap();

        let installer = Installer::new(dir.path(), false);
        let existing = installer.scan_existing().unwrap();
        let report = installer
            .install(&entry("left-pad", DefinitionScope::ScopedToPackage), STUB, &existing)
            .unwrap();

        assert_eq!(report.status, InstallStatus::WouldOverwrite);
        assert_eq!(report.previous, Some(Fingerprint::of(b"// hand edited")));
        assert_eq!(fs::read(&target).unwrap(), b"// hand edited");
    }

    #[test]
    fn test_force_overwrites() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("npm/left-pad_v1.x.x.js");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, b"// hand edited").unwrap();

        let installer = Installer::new(dir.path(), true);
        let report = installer
            .install(&entry("left-pad", DefinitionScope::ScopedToPackage), STUB, &ExistingFiles::new())
            .unwrap();

        assert_eq!(report.status, InstallStatus::Overwritten);
        assert_eq!(fs::read(&target).unwrap(), STUB);
    }

    #[test]
    fn test_file_created_after_scan_is_detected() {
        let dir = TempDir::new().unwrap();
        let installer = Installer::new(dir.path(), false);
        let existing = installer.scan_existing().unwrap();
        assert!(existing.is_empty());

        let target = dir.path().join("npm/left-pad_v1.x.x.js");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, b"// appeared later").unwrap();

        let report = installer
            .install(&entry("left-pad", DefinitionScope::ScopedToPackage), STUB, &existing)
            .unwrap();
        assert_eq!(report.status, InstallStatus::WouldOverwrite);
    }

    #[test]
    fn test_directory_at_target_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("npm/left-pad_v1.x.x.js")).unwrap();

        let installer = Installer::new(dir.path(), true);
        let err = installer
            .install(&entry("left-pad", DefinitionScope::ScopedToPackage), STUB, &ExistingFiles::new())
            .unwrap_err();
        assert!(matches!(err, InstallError::NotAFile(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_npm_dir_is_not_followed() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("npm")).unwrap();

        let installer = Installer::new(dir.path(), true);
        let err = installer
            .install(&entry("@babel/core", DefinitionScope::ScopedToPackage), STUB, &ExistingFiles::new())
            .unwrap_err();

        assert!(matches!(err, InstallError::UnsafePath(_)));
        assert!(!outside.path().join("@babel").exists());
    }

    #[test]
    fn test_scan_existing_keys_relative_paths() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("npm/@babel")).unwrap();
        fs::write(dir.path().join("npm/@babel/core_v7.x.x.js"), b"x").unwrap();

        let existing = Installer::new(dir.path(), false).scan_existing().unwrap();
        assert_eq!(
            existing.get(Path::new("npm/@babel/core_v7.x.x.js")),
            Some(&Fingerprint::of(b"x"))
        );
        assert!(Installer::new(dir.path().join("missing"), false)
            .scan_existing()
            .unwrap()
            .is_empty());
    }
}
