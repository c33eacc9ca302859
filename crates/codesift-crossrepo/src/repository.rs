use std::path::{Path, PathBuf};

use tracing::warn;

/// One subdirectory of a configured root, registered as a searchable
/// repository (spec §4.7, "Repository discovery").
#[derive(Debug, Clone)]
pub struct Repository {
    pub name: String,
    pub path: PathBuf,
}

/// Re-enumerates the configured roots on every call, returning one
/// `Repository` per immediate subdirectory.
pub fn discover_repositories(roots: &[String]) -> Vec<Repository> {
    let mut repos = Vec::new();
    for root in roots {
        let root_path = Path::new(root);
        let entries = match std::fs::read_dir(root_path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %root, error = %e, "failed to enumerate cross-repo root");
                continue;
            }
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                repos.push(Repository { name, path });
            }
        }
    }
    repos
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discovers_immediate_subdirectories_only() {
        let root = tempdir().unwrap();
        std::fs::create_dir(root.path().join("repo-a")).unwrap();
        std::fs::create_dir(root.path().join("repo-b")).unwrap();
        std::fs::write(root.path().join("not-a-repo.txt"), "x").unwrap();

        let repos = discover_repositories(&[root.path().to_string_lossy().into_owned()]);
        let mut names: Vec<_> = repos.into_iter().map(|r| r.name).collect();
        names.sort();
        assert_eq!(names, vec!["repo-a".to_string(), "repo-b".to_string()]);
    }
}
