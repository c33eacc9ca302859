use std::time::{Duration, Instant};

use codesift_core::config::CrossRepoConfig;
use codesift_core::{CodeSiftError, Result};
use rayon::prelude::*;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::repository::{discover_repositories, Repository};

/// A single matching line with surrounding context (spec §4.7,
/// "CodeReference").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeReference {
    pub repository: String,
    pub file_path: String,
    pub line_number: u32,
    pub matched_line: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub term: String,
    pub is_regex: bool,
    pub case_sensitive: bool,
    pub extension_filter: Option<String>,
    pub repository_filter: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SearchSummary {
    pub references: Vec<CodeReference>,
    pub elapsed_ms: u128,
    pub repositories_searched: usize,
    pub repositories_with_matches: usize,
}

/// Compiles the search term either as a literal (escaped) pattern or as a
/// raw regex, per the request's `is_regex` flag (spec §4.7, "Search").
fn compile_pattern(request: &SearchRequest) -> Result<regex::Regex> {
    let pattern = if request.is_regex {
        request.term.clone()
    } else {
        regex::escape(&request.term)
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!request.case_sensitive)
        .build()
        .map_err(|e| CodeSiftError::CrossRepo(format!("invalid search pattern: {}", e)))
}

fn search_repository(
    repo: &Repository,
    pattern: &regex::Regex,
    extension_filter: Option<&str>,
    context_lines: usize,
    max_references: usize,
    deadline: Instant,
) -> Vec<CodeReference> {
    let mut references = Vec::new();

    for entry in WalkDir::new(&repo.path).into_iter().filter_map(|e| e.ok()) {
        if Instant::now() >= deadline || references.len() >= max_references {
            break;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ext) = extension_filter {
            if entry.path().extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        let relative_path = entry
            .path()
            .strip_prefix(&repo.path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        for (idx, line) in lines.iter().enumerate() {
            if references.len() >= max_references {
                break;
            }
            if !pattern.is_match(line) {
                continue;
            }
            let before_start = idx.saturating_sub(context_lines);
            let after_end = (idx + context_lines + 1).min(lines.len());
            references.push(CodeReference {
                repository: repo.name.clone(),
                file_path: relative_path.clone(),
                line_number: (idx + 1) as u32,
                matched_line: line.to_string(),
                context_before: lines[before_start..idx].iter().map(|s| s.to_string()).collect(),
                context_after: lines[idx + 1..after_end].iter().map(|s| s.to_string()).collect(),
            });
        }
    }
    references
}

/// Searches every repository discovered under the configured roots,
/// submitting one task per repository to a bounded rayon thread pool with
/// an overall deadline (spec §4.7, §5 "Cross-repo search pool").
pub fn search(config: &CrossRepoConfig, request: &SearchRequest) -> Result<SearchSummary> {
    let started = Instant::now();
    let deadline = started + Duration::from_secs(config.search_timeout_seconds);
    let pattern = compile_pattern(request)?;

    let mut repos = discover_repositories(&config.roots);
    if let Some(filter) = &request.repository_filter {
        repos.retain(|r| filter.contains(&r.name));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.thread_pool_size.max(1))
        .build()
        .map_err(|e| CodeSiftError::CrossRepo(format!("failed to build search thread pool: {}", e)))?;

    let extension_filter = request.extension_filter.as_deref();
    let context_lines = config.context_lines;
    let max_references = config.max_references_per_repo;

    let mut per_repo: Vec<Vec<CodeReference>> = pool.install(|| {
        repos
            .par_iter()
            .map(|repo| {
                search_repository(
                    repo,
                    &pattern,
                    extension_filter,
                    context_lines,
                    max_references,
                    deadline,
                )
            })
            .collect()
    });

    let repositories_with_matches = per_repo.iter().filter(|r| !r.is_empty()).count();
    let mut references: Vec<CodeReference> = per_repo.drain(..).flatten().collect();
    references.sort_by(|a, b| {
        (&a.repository, &a.file_path, a.line_number).cmp(&(&b.repository, &b.file_path, b.line_number))
    });

    Ok(SearchSummary {
        references,
        elapsed_ms: started.elapsed().as_millis(),
        repositories_searched: repos.len(),
        repositories_with_matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn finds_literal_match_with_context() {
        let root = tempdir().unwrap();
        let repo_dir = root.path().join("repo-a");
        std::fs::create_dir(&repo_dir).unwrap();
        write(&repo_dir, "Main.java", "line one\nneedle here\nline three\n");

        let config = CrossRepoConfig {
            roots: vec![root.path().to_string_lossy().into_owned()],
            context_lines: 1,
            max_references_per_repo: 1000,
            thread_pool_size: 2,
            search_timeout_seconds: 10,
        };
        let request = SearchRequest {
            term: "needle".into(),
            is_regex: false,
            case_sensitive: false,
            extension_filter: None,
            repository_filter: None,
        };

        let summary = search(&config, &request).unwrap();
        assert_eq!(summary.references.len(), 1);
        assert_eq!(summary.references[0].context_before, vec!["line one".to_string()]);
        assert_eq!(summary.references[0].context_after, vec!["line three".to_string()]);
    }

    #[test]
    fn respects_per_repo_cap() {
        let root = tempdir().unwrap();
        let repo_dir = root.path().join("repo-a");
        std::fs::create_dir(&repo_dir).unwrap();
        let content = "needle\n".repeat(10);
        write(&repo_dir, "Big.java", &content);

        let config = CrossRepoConfig {
            roots: vec![root.path().to_string_lossy().into_owned()],
            context_lines: 0,
            max_references_per_repo: 3,
            thread_pool_size: 1,
            search_timeout_seconds: 10,
        };
        let request = SearchRequest {
            term: "needle".into(),
            is_regex: false,
            case_sensitive: false,
            extension_filter: None,
            repository_filter: None,
        };

        let summary = search(&config, &request).unwrap();
        assert_eq!(summary.references.len(), 3);
    }
}
