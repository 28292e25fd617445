//! Source position tracking shared by every AST node and diagnostic.
//!
//! Mirrors `original_source/src/source.h`: a flat table of opened files
//! (tracking, for included files, the position of the `#include` that
//! pulled them in) plus a `(file, line, column)` position on every node.

use std::fmt;
use std::rc::Rc;

/// Index into [`SourceState::files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

/// A position within the flattened (post-preprocessor) source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    pub file: FileId,
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    #[must_use]
    pub fn new(file: FileId, line: u32, col: u32) -> Self {
        SourcePos { file, line, col }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.0, self.line, self.col)
    }
}

/// One file that was opened, directly or via `#include`.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: Rc<str>,
    /// The content of each line, 1-indexed via `lines[lineno - 1]`.
    pub lines: Vec<Rc<str>>,
    /// The position of the `#include` directive that pulled this file in,
    /// if any; `None` for the root translation unit.
    pub included_from: Option<SourcePos>,
}

/// Tracks every file that participated in one compile, so diagnostics can
/// print the exact `<file>:<line>:<col>` and "In file included from" chain
/// from spec.md §7.
#[derive(Debug, Default)]
pub struct SourceState {
    pub files: Vec<SourceFile>,
}

impl SourceState {
    #[must_use]
    pub fn new() -> Self {
        SourceState::default()
    }

    /// Register a new file and return its id.
    pub fn add_file(&mut self, filename: impl Into<Rc<str>>, content: &str, included_from: Option<SourcePos>) -> FileId {
        let lines = content.split('\n').map(Rc::from).collect();
        self.files.push(SourceFile { filename: filename.into(), lines, included_from });
        FileId((self.files.len() - 1) as u32)
    }

    #[must_use]
    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    /// The raw text of the line a position refers to, or `""` if out of range.
    #[must_use]
    pub fn line_text(&self, pos: SourcePos) -> &str {
        self.file(pos.file).lines.get(pos.line as usize - 1).map_or("", |l| l.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_included_from_chain() {
        let mut src = SourceState::new();
        let root = src.add_file("main.ika", "line one\nline two", None);
        let inc_pos = SourcePos::new(root, 1, 9);
        let inner = src.add_file("util.ika", "body", Some(inc_pos));
        assert_eq!(src.file(inner).included_from, Some(inc_pos));
        assert_eq!(src.line_text(SourcePos::new(root, 2, 0)), "line two");
    }
}
