use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{DeployError, Result};

/// Lazily walk `root`, yielding every regular file beneath it.
///
/// Directories are skipped. Each call starts a fresh walk. Entries are
/// sorted by file name so repeated walks yield the same order. A traversal
/// error is yielded in place and the consumer decides whether to stop.
pub fn walk_files(root: &Path) -> impl Iterator<Item = Result<PathBuf>> + use<> {
    let root_path = root.to_path_buf();

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
            Ok(_) => None,
            Err(source) => Some(Err(DeployError::Walk {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root_path.clone()),
                source,
            })),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_yields_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("216/css")).unwrap();
        fs::write(dir.path().join("216/app.js"), "x").unwrap();
        fs::write(dir.path().join("216/css/app.css"), "body{}").unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let files: Vec<PathBuf> = walk_files(dir.path()).collect::<Result<_>>().unwrap();

        assert_eq!(
            files,
            vec![
                dir.path().join("216/app.js"),
                dir.path().join("216/css/app.css"),
                dir.path().join("index.html"),
            ]
        );
    }

    #[test]
    fn test_walk_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        assert_eq!(walk_files(dir.path()).count(), 1);
        assert_eq!(walk_files(dir.path()).count(), 1);
    }

    #[test]
    fn test_missing_root_yields_walk_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("build");

        let results: Vec<_> = walk_files(&missing).collect();

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(DeployError::Walk { .. })));
    }
}
