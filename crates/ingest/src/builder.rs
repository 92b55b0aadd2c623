//! Context builder — walks a tree and assembles a [`ContextDocument`].
//!
//! Traversal order is deterministic: inside each directory, files come
//! first, then subdirectories, each group sorted by name. Excluded
//! directories are pruned before descending, so the cost of a walk is
//! bounded by the included portion of the tree.

use std::cell::Cell;
use std::path::{Component, Path};

use contextmesh_core::{CancellationToken, IngestError};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::classify::{self, FileKind};
use crate::document::{ContextDocument, FileEntry, IngestStats};
use crate::exclusion::ExclusionSpec;

/// Builds context documents from directory trees.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    extra_patterns: Vec<String>,
    cancel: Option<CancellationToken>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patterns applied after the defaults and the root's `.gitignore`.
    pub fn with_extra_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Abort the walk once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Ingest the tree under `root`.
    ///
    /// Fails only when the root itself cannot be traversed or the run is
    /// cancelled. Unreadable and binary files are skipped.
    pub fn build(&self, root: impl AsRef<Path>) -> Result<ContextDocument, IngestError> {
        let root = root.as_ref();
        let metadata = std::fs::metadata(root).map_err(|e| IngestError::RootInaccessible {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(IngestError::NotADirectory(root.to_path_buf()));
        }

        let spec = ExclusionSpec::build_with(root, &self.extra_patterns);
        let mut document = ContextDocument::new();
        let mut stats = IngestStats::default();
        let pruned = Cell::new(0usize);

        let walker = WalkDir::new(root)
            .sort_by(|a, b| {
                a.file_type()
                    .is_dir()
                    .cmp(&b.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let rel = relative_path(root, entry.path());
                if spec.excludes_entry(&rel, true) {
                    debug!(path = %rel, "Pruning excluded directory");
                    pruned.set(pruned.get() + 1);
                    return false;
                }
                true
            });

        for item in walker {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(IngestError::Cancelled);
            }

            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    if err.depth() == 0 {
                        return Err(IngestError::RootInaccessible {
                            path: root.to_path_buf(),
                            reason: err.to_string(),
                        });
                    }
                    warn!(error = %err, "Skipping unreadable directory entry");
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            self.ingest_file(root, &entry, &spec, &mut document, &mut stats);
        }

        stats.dirs_pruned = pruned.get();
        document.set_stats(stats);
        let stats = document.stats();

        info!(
            root = %root.display(),
            files = stats.files_included,
            excluded = stats.files_excluded,
            pruned = stats.dirs_pruned,
            binary = stats.binary_skipped,
            unreadable = stats.unreadable_skipped,
            "Ingestion complete"
        );

        Ok(document)
    }

    fn ingest_file(
        &self,
        root: &Path,
        entry: &DirEntry,
        spec: &ExclusionSpec,
        document: &mut ContextDocument,
        stats: &mut IngestStats,
    ) {
        let rel = relative_path(root, entry.path());

        if spec.excludes_entry(&rel, false) {
            stats.files_excluded += 1;
            return;
        }

        // Symlinks to directories and special files are dropped quietly.
        // Anything whose metadata cannot be read (a dangling link) falls
        // through to the probe and is counted as unreadable.
        if std::fs::metadata(entry.path()).is_ok_and(|metadata| !metadata.is_file()) {
            debug!(path = %rel, "Skipping non-regular file");
            return;
        }

        match classify::classify(entry.path()) {
            FileKind::Text => {}
            FileKind::Binary => {
                debug!(path = %rel, "Skipping binary file");
                stats.binary_skipped += 1;
                return;
            }
            FileKind::Unreadable(e) => {
                warn!(path = %rel, error = %e, "Cannot read file, skipping");
                stats.unreadable_skipped += 1;
                return;
            }
        }

        match std::fs::read(entry.path()) {
            Ok(bytes) => document.push(FileEntry {
                path: rel,
                content: classify::decode_lossy(bytes),
            }),
            Err(e) => {
                warn!(path = %rel, error = %e, "Cannot read file, skipping");
                stats.unreadable_skipped += 1;
            }
        }
    }
}

/// Ingest `root` with the default configuration.
pub fn build_context(root: impl AsRef<Path>) -> Result<ContextDocument, IngestError> {
    ContextBuilder::new().build(root)
}

/// `/`-separated path of `path` relative to `root`.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = String::new();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn reference_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.txt", b"hello");
        write(root, ".git/config", b"[core]");
        write(root, "node_modules/x.js", b"module.exports = 1;");
        write(root, "img.bin", &[0x00, 0x01, 0x02]);

        let doc = build_context(root).unwrap();

        assert_eq!(doc.paths().collect::<Vec<_>>(), vec!["a.txt"]);
        assert_eq!(doc.get("a.txt").unwrap().content, "hello");
        assert_eq!(
            doc.render(),
            "<codebase>\n<file path=\"a.txt\">\nhello\n</file>\n</codebase>\n"
        );
        let stats = doc.stats();
        assert_eq!(stats.dirs_pruned, 2);
        assert_eq!(stats.binary_skipped, 1);
    }

    #[test]
    fn files_before_subdirectories_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "c.txt", b"c");
        write(root, "a/inner.txt", b"inner");
        write(root, "b.txt", b"b");
        write(root, "a/z/deep.txt", b"deep");
        write(root, "a/first.txt", b"first");

        let doc = build_context(root).unwrap();
        assert_eq!(
            doc.paths().collect::<Vec<_>>(),
            vec!["b.txt", "c.txt", "a/first.txt", "a/inner.txt", "a/z/deep.txt"]
        );
    }

    #[test]
    fn ingestion_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for i in 0..20 {
            write(root, &format!("src/m{i}.rs"), format!("// {i}").as_bytes());
        }
        write(root, "README.md", b"# readme");

        let first = build_context(root).unwrap().render();
        let second = build_context(root).unwrap().render();
        assert_eq!(first, second);
    }

    #[test]
    fn excluded_subtree_is_never_visited() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for i in 0..50 {
            write(root, &format!("node_modules/pkg{i}/index.js"), b"x");
        }
        write(root, "index.js", b"main");

        let doc = build_context(root).unwrap();
        assert_eq!(doc.len(), 1);
        let stats = doc.stats();
        assert_eq!(stats.dirs_pruned, 1);
        // Files below a pruned directory are never even evaluated.
        assert_eq!(stats.files_excluded, 0);
    }

    #[test]
    fn gitignore_rules_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, ".gitignore", b"*.log\n!keep.log\ntmp/\n");
        write(root, "debug.log", b"noise");
        write(root, "keep.log", b"signal");
        write(root, "tmp/scratch.txt", b"scratch");
        write(root, "src/app.py", b"print('hi')");

        let doc = build_context(root).unwrap();
        let paths: Vec<_> = doc.paths().collect();
        assert_eq!(paths, vec![".gitignore", "keep.log", "src/app.py"]);
        assert_eq!(doc.stats().files_excluded, 1);
    }

    #[test]
    fn nested_excluded_directory_names_are_pruned_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "web/node_modules/react/index.js", b"react");
        write(root, "web/app.ts", b"app");
        write(root, "svc/__pycache__/m.pyc", b"cache");
        write(root, "svc/m.py", b"m");

        let doc = build_context(root).unwrap();
        assert_eq!(doc.paths().collect::<Vec<_>>(), vec!["svc/m.py", "web/app.ts"]);
    }

    #[test]
    fn binary_probe_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut inside = vec![b'a'; 1024];
        inside[1023] = 0;
        let mut outside = vec![b'a'; 1024];
        outside.push(0);
        write(root, "inside.dat", &inside);
        write(root, "outside.dat", &outside);

        let doc = build_context(root).unwrap();
        assert_eq!(doc.paths().collect::<Vec<_>>(), vec!["outside.dat"]);
        assert_eq!(doc.get("outside.dat").unwrap().content.len(), 1025);
    }

    #[test]
    fn undecodable_bytes_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "latin1.txt", b"caf\xe9");

        let doc = build_context(root).unwrap();
        assert_eq!(doc.get("latin1.txt").unwrap().content, "caf\u{FFFD}");
    }

    #[test]
    fn extra_patterns_exclude_more() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.txt", b"a");
        write(root, "fixtures/big.json", b"{}");

        let doc = ContextBuilder::new()
            .with_extra_patterns(["fixtures/"])
            .build(root)
            .unwrap();
        assert_eq!(doc.paths().collect::<Vec<_>>(), vec!["a.txt"]);
    }

    #[test]
    fn snapshot_output_is_not_reingested() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.txt", b"a");
        write(root, crate::SNAPSHOT_FILE, b"<codebase>\n</codebase>\n");

        let doc = build_context(root).unwrap();
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            build_context(&missing),
            Err(IngestError::RootInaccessible { .. })
        ));
    }

    #[test]
    fn file_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, b"a").unwrap();
        assert!(matches!(
            build_context(&file),
            Err(IngestError::NotADirectory(_))
        ));
    }

    #[test]
    fn empty_root_gives_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let doc = build_context(dir.path()).unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.render(), "<codebase>\n</codebase>\n");
    }

    #[test]
    fn cancelled_run_stops() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", b"a");
        let token = CancellationToken::new();
        token.cancel();

        let result = ContextBuilder::new()
            .with_cancellation(token)
            .build(dir.path());
        assert!(matches!(result, Err(IngestError::Cancelled)));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "real/a.txt", b"a");
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

        let doc = build_context(root).unwrap();
        assert_eq!(doc.paths().collect::<Vec<_>>(), vec!["real/a.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_counted_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.txt", b"hello");
        std::os::unix::fs::symlink(root.join("missing.txt"), root.join("dangling.txt")).unwrap();

        let doc = build_context(root).unwrap();
        assert_eq!(doc.paths().collect::<Vec<_>>(), vec!["a.txt"]);
        assert_eq!(doc.stats().unreadable_skipped, 1);
        assert_eq!(doc.stats().files_included, 1);
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/repo");
        assert_eq!(relative_path(root, &root.join("a").join("b.rs")), "a/b.rs");
        assert_eq!(relative_path(root, root), "");
    }
}
