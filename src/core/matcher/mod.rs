//! Glob resolution of source files.
//!
//! Patterns are `/`-separated and relative to a root directory. `**` matches
//! any number of directories, `*` matches within a single path component and
//! never a leading dot, and a leading `!` turns a pattern into an exclusion.
//! Results are ordered lexicographically by their root-relative path.

#![allow(clippy::result_large_err)] // Matcher returns AppError for structured diagnostics.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// A file selected by the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Absolute (root-joined) path of the file.
    pub path: PathBuf,
    /// Path relative to the glob base of the pattern that selected it.
    pub relative: PathBuf,
}

#[derive(Debug, Clone)]
struct IncludePattern {
    raw: String,
    pattern: Pattern,
    base: PathBuf,
}

/// Compiled include/exclude pattern list.
#[derive(Debug, Clone)]
pub struct PatternSet {
    includes: Vec<IncludePattern>,
    excludes: Vec<Pattern>,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for raw in patterns {
            let raw = raw.as_ref().trim();
            if let Some(negated) = raw.strip_prefix('!') {
                excludes.push(compile(normalize(negated))?);
            } else {
                let normalized = normalize(raw);
                includes.push(IncludePattern {
                    raw: normalized.to_string(),
                    pattern: compile(normalized)?,
                    base: glob_base(normalized),
                });
            }
        }
        Ok(Self { includes, excludes })
    }

    /// Whether a root-relative path is selected by this set.
    pub fn matches(&self, relative: &Path) -> bool {
        let candidate = to_slash(relative);
        self.includes
            .iter()
            .any(|include| include.pattern.matches_with(&candidate, MATCH_OPTIONS))
            && !self.is_excluded(&candidate)
    }

    fn is_excluded(&self, candidate: &str) -> bool {
        self.excludes
            .iter()
            .any(|pattern| pattern.matches_with(candidate, MATCH_OPTIONS))
    }
}

/// Resolves a pattern set against a root directory.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    root: PathBuf,
    patterns: PatternSet,
}

impl FileMatcher {
    pub fn new(root: impl Into<PathBuf>, patterns: PatternSet) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the filesystem and return every regular file selected by the
    /// pattern set, ordered by root-relative path.
    pub fn resolve(&self) -> Result<Vec<MatchedFile>, AppError> {
        fs::read_dir(&self.root).map_err(|err| {
            AppError::filesystem("read root directory", &self.root, err).with_code("BLD-GLOB-002")
        })?;

        let mut selected: BTreeMap<String, MatchedFile> = BTreeMap::new();
        for include in &self.patterns.includes {
            let start = self.root.join(&include.base);
            if !start.is_dir() {
                tracing::trace!(pattern = %include.raw, base = %start.display(), "glob base missing");
                continue;
            }

            for entry in WalkDir::new(&start).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|err| {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| start.clone());
                    AppError::new(
                        ErrorCategory::FilesystemError,
                        format!("failed to read {}: {}", path.display(), err),
                    )
                    .with_path(&path)
                    .with_code("BLD-GLOB-003")
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(from_root) = entry.path().strip_prefix(&self.root) else {
                    continue;
                };
                let key = to_slash(from_root);
                if selected.contains_key(&key)
                    || !include.pattern.matches_with(&key, MATCH_OPTIONS)
                    || self.patterns.is_excluded(&key)
                {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&start)
                    .unwrap_or(from_root)
                    .to_path_buf();
                selected.insert(
                    key,
                    MatchedFile {
                        path: entry.path().to_path_buf(),
                        relative,
                    },
                );
            }
        }

        Ok(selected.into_values().collect())
    }
}

/// Convenience wrapper around [`FileMatcher`].
pub fn resolve<I, S>(root: &Path, patterns: I) -> Result<Vec<MatchedFile>, AppError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    FileMatcher::new(root, PatternSet::new(patterns)?).resolve()
}

fn compile(pattern: &str) -> Result<Pattern, AppError> {
    Pattern::new(pattern).map_err(|err| {
        AppError::config(format!("invalid glob pattern '{}': {}", pattern, err))
            .with_code("BLD-GLOB-001")
    })
}

fn normalize(pattern: &str) -> &str {
    let mut current = pattern;
    while let Some(stripped) = current.strip_prefix("./") {
        current = stripped;
    }
    current
}

/// Leading components of a pattern that contain no glob metacharacters.
/// A pattern without metacharacters names a file; its base is the parent.
fn glob_base(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').collect();
    let literal: Vec<&str> = components
        .iter()
        .take_while(|part| !part.contains(['*', '?', '[', '{']))
        .copied()
        .collect();
    let take = if literal.len() == components.len() {
        literal.len().saturating_sub(1)
    } else {
        literal.len()
    };
    literal[..take]
        .iter()
        .filter(|part| !part.is_empty())
        .collect()
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
