//! Capability-based filesystem helpers for the Greenway tools.
//!
//! Paths arrive from configuration as UTF-8 strings. Each helper resolves an
//! ambient directory handle once and performs the remaining work relative to
//! it.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// Create every missing directory above `path`.
///
/// Used before opening the feature database so a fresh checkout can point
/// `--database` at a nested location.
///
/// # Errors
///
/// Returns an I/O error when a directory cannot be created or the path is not
/// valid UTF-8 after splitting.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) else {
        return Ok(());
    };
    let (root, below) = split_at_root(parent)?;
    if below.as_str().is_empty() {
        return Ok(());
    }
    root.create_dir_all(&below)
}

/// Report whether `path` names an existing directory.
///
/// # Errors
///
/// Returns an I/O error for failures other than the path being absent.
pub fn is_directory(path: &Utf8Path) -> io::Result<bool> {
    let (root, below) = split_at_root(path)?;
    let target = if below.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        below.as_path()
    };
    match root.metadata(target) {
        Ok(meta) => Ok(meta.is_dir()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Write `contents` to `path`, creating parent directories and replacing any
/// existing file.
///
/// # Errors
///
/// Returns an I/O error when the directory cannot be prepared or the file
/// cannot be written.
pub fn write_file(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?;
    let parent = path.parent().filter(|p| !p.as_str().is_empty());
    let dir = fs_utf8::Dir::open_ambient_dir(
        parent.unwrap_or_else(|| Utf8Path::new(".")),
        ambient_authority(),
    )?;
    dir.write(file_name, contents)
}

/// Split `path` into an ambient handle for its root and the relative rest.
///
/// Relative paths are rooted at the working directory.
fn split_at_root(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let base = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let drive = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(drive).join(std::path::MAIN_SEPARATOR.to_string())
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => Utf8PathBuf::from("."),
    };
    let below = if base.as_str() == "." {
        path.to_path_buf()
    } else {
        path.strip_prefix(&base)
            .map_err(|_| io::Error::other(format!("cannot strip {base} from {path}")))?
            .to_path_buf()
    };
    let root = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((root, below))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        (dir, root)
    }

    #[rstest]
    fn creates_nested_parents(temp_root: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = temp_root;
        let db = root.join("data/nested/greenway.db");

        ensure_parent_dir(&db).expect("create parents");

        assert!(is_directory(&root.join("data/nested")).expect("stat"));
        assert!(!db.as_std_path().exists());
    }

    #[rstest]
    fn bare_file_names_need_no_parent() {
        ensure_parent_dir(Utf8Path::new("greenway.db")).expect("nothing to create");
    }

    #[rstest]
    fn missing_paths_are_not_directories(temp_root: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = temp_root;
        assert!(!is_directory(&root.join("absent")).expect("stat"));
    }

    #[rstest]
    fn files_are_not_directories(temp_root: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = temp_root;
        let file = root.join("trails.geojson");
        write_file(&file, b"{}").expect("write file");
        assert!(!is_directory(&file).expect("stat"));
    }

    #[rstest]
    fn write_file_replaces_contents(temp_root: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = temp_root;
        let file = root.join("out/entrances.geojson");

        write_file(&file, b"first").expect("first write");
        write_file(&file, b"second").expect("second write");

        let contents = std::fs::read_to_string(file.as_std_path()).expect("read back");
        assert_eq!(contents, "second");
    }
}
