//! Exclusion rules — gitignore-style patterns evaluated in order.
//!
//! Rules are compiled once per ingestion run. Evaluation walks the rule
//! list front to back and the LAST matching rule decides, so a later
//! `!pattern` re-includes what an earlier rule excluded. Glob compilation
//! is delegated to `globset`; precedence is handled here.

use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;
use tracing::{debug, warn};

/// Name of the repository-local ignore file read from the ingestion root.
pub const IGNORE_FILE: &str = ".gitignore";

/// File name the CLI writes snapshots to; never ingested back.
pub const SNAPSHOT_FILE: &str = "contextmesh_snapshot.xml";

/// Patterns applied to every run, before the ignore file.
pub const DEFAULT_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    "env",
    "*.lock",
    "package-lock.json",
    "dist",
    "build",
    "*.pyc",
    ".DS_Store",
    SNAPSHOT_FILE,
    ".env",
];

/// One compiled ignore line.
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    pattern: String,
    matcher: GlobMatcher,
    negated: bool,
    dir_only: bool,
    anchored: bool,
}

impl ExclusionRule {
    /// Parse a single ignore-file line.
    ///
    /// Returns `Ok(None)` for blank lines and comments.
    pub fn parse(line: &str) -> Result<Option<Self>, globset::Error> {
        let trimmed = trim_unescaped_end(line);
        if trimmed.trim_start().is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        // `\#` and `\!` escape a literal leading character.
        let body = match body.strip_prefix('\\') {
            Some(rest) if rest.starts_with('#') || rest.starts_with('!') => rest,
            _ => body,
        };

        let (dir_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };

        let anchored = body.contains('/');
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            return Ok(None);
        }

        let glob = if anchored {
            body.to_string()
        } else {
            format!("**/{body}")
        };

        let matcher = GlobBuilder::new(&glob)
            .literal_separator(true)
            .backslash_escape(true)
            .build()?
            .compile_matcher();

        Ok(Some(Self {
            pattern: trimmed.to_string(),
            matcher,
            negated,
            dir_only,
            anchored,
        }))
    }

    /// The line this rule was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_dir_only(&self) -> bool {
        self.dir_only
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    fn applies_to(&self, rel_path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        self.matcher.is_match(rel_path)
    }
}

/// An ordered set of exclusion rules for one ingestion root.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSpec {
    rules: Vec<ExclusionRule>,
}

impl ExclusionSpec {
    /// Compile patterns in order. Invalid globs are logged and skipped.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match ExclusionRule::parse(pattern) {
                Ok(Some(rule)) => rules.push(rule),
                Ok(None) => {}
                Err(e) => warn!(pattern = %pattern, error = %e, "Skipping invalid ignore pattern"),
            }
        }
        Self { rules }
    }

    /// The built-in defaults only.
    pub fn defaults() -> Self {
        Self::from_patterns(DEFAULT_PATTERNS)
    }

    /// Defaults followed by `<root>/.gitignore`, if present.
    pub fn build(root: &Path) -> Self {
        Self::build_with(root, &[])
    }

    /// Defaults, then `<root>/.gitignore`, then `extra` patterns.
    pub fn build_with(root: &Path, extra: &[String]) -> Self {
        let mut patterns: Vec<String> = DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect();

        let ignore_path = root.join(IGNORE_FILE);
        match std::fs::read(&ignore_path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let before = patterns.len();
                patterns.extend(text.lines().map(str::to_string));
                debug!(
                    path = %ignore_path.display(),
                    lines = patterns.len() - before,
                    "Loaded ignore file"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %ignore_path.display(), error = %e, "Cannot read ignore file, using defaults");
            }
        }

        patterns.extend(extra.iter().cloned());
        Self::from_patterns(patterns)
    }

    /// Whether a file at `rel_path` is excluded.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.matches_path(rel_path, false)
    }

    /// Whether `rel_path` is excluded, ancestors included.
    ///
    /// A path under an excluded directory stays excluded even if a later
    /// rule would re-include it, like git.
    pub fn matches_path(&self, rel_path: &str, is_dir: bool) -> bool {
        let rel_path = normalize(rel_path);
        if rel_path.is_empty() {
            return false;
        }

        for (idx, _) in rel_path.match_indices('/') {
            if self.excludes_entry(&rel_path[..idx], true) {
                return true;
            }
        }

        self.excludes_entry(&rel_path, is_dir)
    }

    /// Evaluate the rules against `rel_path` alone, without its ancestors.
    ///
    /// The builder prunes directories before descending, so by the time an
    /// entry is visited its ancestors are known to be included.
    pub(crate) fn excludes_entry(&self, rel_path: &str, is_dir: bool) -> bool {
        let mut excluded = false;
        for rule in &self.rules {
            if rule.applies_to(rel_path, is_dir) {
                excluded = !rule.negated;
            }
        }
        excluded
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Strip trailing whitespace unless the last character is escaped with a
/// backslash (`foo\ ` keeps its space).
fn trim_unescaped_end(line: &str) -> &str {
    let trimmed = line.trim_end();
    let backslashes = trimmed.chars().rev().take_while(|&c| c == '\\').count();
    if backslashes % 2 == 0 {
        return trimmed;
    }
    match line[trimmed.len()..].chars().next() {
        Some(escaped) => &line[..trimmed.len() + escaped.len_utf8()],
        None => trimmed,
    }
}

fn normalize(rel_path: &str) -> String {
    let unified = rel_path.replace('\\', "/");
    let mut path = unified.as_str();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.trim_matches('/').to_string()
}
