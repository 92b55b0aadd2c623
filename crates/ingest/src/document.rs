//! The serialized codebase handed to the LLM backend.
//!
//! Wire format:
//!
//! ```text
//! <codebase>
//! <file path="src/main.rs">
//! ...content...
//! </file>
//! </codebase>
//! ```
//!
//! Paths and content are XML-escaped so a file containing `</file>` (or a
//! path containing `"`) cannot break the nesting.

use std::fmt;

const ROOT_OPEN: &str = "<codebase>\n";
const ROOT_CLOSE: &str = "</codebase>\n";

/// One ingested file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the ingestion root, `/`-separated.
    pub path: String,
    /// Decoded content.
    pub content: String,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Counters collected while building a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files_included: usize,
    /// Files rejected by an exclusion rule (pruned directories not counted).
    pub files_excluded: usize,
    pub dirs_pruned: usize,
    pub binary_skipped: usize,
    pub unreadable_skipped: usize,
}

/// Ordered list of ingested files.
#[derive(Debug, Clone, Default)]
pub struct ContextDocument {
    entries: Vec<FileEntry>,
    stats: IngestStats,
}

impl ContextDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: FileEntry) {
        self.entries.push(entry);
        self.stats.files_included = self.entries.len();
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub(crate) fn set_stats(&mut self, stats: IngestStats) {
        self.stats = IngestStats {
            files_included: self.entries.len(),
            ..stats
        };
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize into the `<codebase>` wire format.
    pub fn render(&self) -> String {
        let body: usize = self
            .entries
            .iter()
            .map(|e| e.path.len() + e.content.len() + 24)
            .sum();
        let mut out = String::with_capacity(ROOT_OPEN.len() + ROOT_CLOSE.len() + body);

        out.push_str(ROOT_OPEN);
        for entry in &self.entries {
            out.push_str("<file path=\"");
            escape_into(&mut out, &entry.path, true);
            out.push_str("\">\n");
            escape_into(&mut out, &entry.content, false);
            out.push_str("\n</file>\n");
        }
        out.push_str(ROOT_CLOSE);
        out
    }
}

impl fmt::Display for ContextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
