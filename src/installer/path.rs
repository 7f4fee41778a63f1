// src/installer/path.rs

//! Keeping writes inside the install root
//!
//! Install paths are derived from package names found in the definitions
//! tree, so they are checked before anything touches the disk.

use super::InstallError;
use std::path::{Component, Path, PathBuf};

/// Normalize a relative install path
///
/// Drops `.` components and rejects `..`, absolute paths and empty results.
pub fn sanitize_relative(path: &Path) -> Result<PathBuf, InstallError> {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(InstallError::UnsafePath(path.to_path_buf()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(InstallError::UnsafePath(path.to_path_buf()));
    }
    Ok(normalized)
}

/// Join `relative` under `root`, refusing anything that would land outside it
///
/// The deepest part of the joined path that already exists is compared
/// canonically against the root, which catches a symlinked directory pointing
/// out of the root even when the directories below it are still to be created.
pub fn safe_join(root: &Path, relative: &Path) -> Result<PathBuf, InstallError> {
    let joined = root.join(sanitize_relative(relative)?);

    // Nothing below a missing root exists yet, symlinks included
    let Ok(canonical_root) = root.canonicalize() else {
        return Ok(joined);
    };

    let Some(existing) = joined
        .ancestors()
        .skip(1)
        .find(|ancestor| ancestor.symlink_metadata().is_ok())
    else {
        return Ok(joined);
    };

    // A dangling symlink fails to canonicalize and is rejected too
    match existing.canonicalize() {
        Ok(canonical) if canonical.starts_with(&canonical_root) => Ok(joined),
        _ => Err(InstallError::UnsafePath(relative.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_relative() {
        assert_eq!(
            sanitize_relative(Path::new("npm/left-pad_v1.x.x.js")).unwrap(),
            PathBuf::from("npm/left-pad_v1.x.x.js")
        );
        assert_eq!(
            sanitize_relative(Path::new("./npm/./@babel/core_v7.x.x.js")).unwrap(),
            PathBuf::from("npm/@babel/core_v7.x.x.js")
        );
    }

    #[test]
    fn test_sanitize_relative_rejects_escapes() {
        for bad in ["../x.js", "npm/../../x.js", "/etc/passwd", "", "."] {
            assert!(sanitize_relative(Path::new(bad)).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_safe_join() {
        let root = PathBuf::from("/tmp/stubkit-test");
        assert_eq!(
            safe_join(&root, Path::new("npm/x_v1.x.x.js")).unwrap(),
            PathBuf::from("/tmp/stubkit-test/npm/x_v1.x.x.js")
        );
        assert!(safe_join(&root, Path::new("../x.js")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_safe_join_rejects_symlink_escape() {
        let root = tempfile::TempDir::new().unwrap();
        let outside = tempfile::TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("npm")).unwrap();

        let err = safe_join(root.path(), Path::new("npm/x_v1.x.x.js")).unwrap_err();
        assert!(matches!(err, InstallError::UnsafePath(_)));

        // Directories below the link do not exist yet
        let err = safe_join(root.path(), Path::new("npm/@babel/core_v7.x.x.js")).unwrap_err();
        assert!(matches!(err, InstallError::UnsafePath(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_safe_join_rejects_dangling_symlink() {
        let root = tempfile::TempDir::new().unwrap();
        std::os::unix::fs::symlink("/nonexistent/stubkit", root.path().join("npm")).unwrap();

        assert!(safe_join(root.path(), Path::new("npm/@babel/core_v7.x.x.js")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_safe_join_allows_symlinked_root() {
        let real = tempfile::TempDir::new().unwrap();
        let links = tempfile::TempDir::new().unwrap();
        let root = links.path().join("flow-typed");
        std::os::unix::fs::symlink(real.path(), &root).unwrap();

        assert_eq!(
            safe_join(&root, Path::new("npm/@babel/core_v7.x.x.js")).unwrap(),
            root.join("npm/@babel/core_v7.x.x.js")
        );
    }
}
