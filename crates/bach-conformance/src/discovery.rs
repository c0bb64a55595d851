//! Fixture file discovery

use crate::config::Discovery;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

fn is_json(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("json"))
}

fn is_excluded(entry: &DirEntry, exclude_dir: Option<&str>) -> bool {
    match exclude_dir {
        Some(name) => entry.file_type().is_dir() && entry.file_name() == OsStr::new(name),
        None => false,
    }
}

fn under_dir(path: &Path, root: &Path, dir: Option<&str>) -> bool {
    let Some(dir) = dir else {
        return true;
    };
    path.strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .map(|parent| parent.components().any(|c| c.as_os_str() == OsStr::new(dir)))
        .unwrap_or(false)
}

fn name_matches(path: &Path, file: Option<&str>) -> bool {
    match file {
        Some(fragment) => path
            .file_name()
            .map(|name| name.to_string_lossy().contains(fragment))
            .unwrap_or(false),
        None => true,
    }
}

/// Every `.json` fixture below `root`, narrowed by `discovery`, in path order
///
/// A missing root yields no files.
pub fn find_fixture_files(root: &Path, discovery: &Discovery) -> Vec<PathBuf> {
    if !root.exists() {
        tracing::warn!("Directory not found: {:?}", root);
        return Vec::new();
    }

    let exclude_dir = discovery.exclude_dir.as_deref();
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e, exclude_dir))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_json(e.path()))
        .map(DirEntry::into_path)
        .filter(|p| under_dir(p, root, discovery.dir.as_deref()))
        .filter(|p| name_matches(p, discovery.file.as_deref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn corpus() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("stExample")).unwrap();
        fs::create_dir_all(root.join("stSlow/nested")).unwrap();
        fs::write(root.join("stExample/add11.json"), "{}").unwrap();
        fs::write(root.join("stExample/mul.json"), "{}").unwrap();
        fs::write(root.join("stExample/readme.md"), "").unwrap();
        fs::write(root.join("stSlow/nested/loop.json"), "{}").unwrap();
        dir
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_finds_json_recursively_in_order() {
        let dir = corpus();
        let files = find_fixture_files(dir.path(), &Discovery::default());
        assert_eq!(names(&files), vec!["add11.json", "mul.json", "loop.json"]);
    }

    #[test]
    fn test_file_and_dir_narrowing() {
        let dir = corpus();
        let only_add = Discovery {
            file: Some("add".into()),
            ..Default::default()
        };
        assert_eq!(names(&find_fixture_files(dir.path(), &only_add)), vec!["add11.json"]);

        let only_slow = Discovery {
            dir: Some("stSlow".into()),
            ..Default::default()
        };
        assert_eq!(names(&find_fixture_files(dir.path(), &only_slow)), vec!["loop.json"]);
    }

    #[test]
    fn test_exclude_dir() {
        let dir = corpus();
        let discovery = Discovery {
            exclude_dir: Some("stSlow".into()),
            ..Default::default()
        };
        assert_eq!(
            names(&find_fixture_files(dir.path(), &discovery)),
            vec!["add11.json", "mul.json"]
        );
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(find_fixture_files(&dir.path().join("absent"), &Discovery::default()).is_empty());
    }
}
