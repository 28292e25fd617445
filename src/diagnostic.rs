//! User-facing diagnostic rendering: `file:line:col: level: message`,
//! the offending source line, a caret under the exact column, and an
//! "In file included from" chain when the position is in an included
//! file.
//!
//! Ported from `original_source/src/error.c`'s `print_message`.

use std::fmt::Write as _;

use crate::types::source::{SourcePos, SourceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
        }
    }
}

/// Render one diagnostic at `pos` in `src` to a string, matching
/// `print_message`'s output byte for byte (modulo the trailing newline,
/// which callers add when writing to a stream).
#[must_use]
pub fn render(level: Level, src: &SourceState, pos: SourcePos, message: &str) -> String {
    let mut out = String::new();
    let file = src.file(pos.file);

    if pos.file.0 != 0 {
        let mut chain = Vec::new();
        let mut cur_file = pos.file;
        let mut cur_pos = file.included_from;
        while let Some(p) = cur_pos {
            chain.push((src.file(p.file).filename.clone(), p.line));
            cur_file = p.file;
            cur_pos = src.file(cur_file).included_from;
        }
        for (i, (filename, line)) in chain.iter().enumerate() {
            let sep = if i + 1 == chain.len() { ':' } else { ',' };
            if i == 0 {
                let _ = writeln!(out, "In file included from {filename}:{line}{sep}");
            } else {
                let _ = writeln!(out, "                 from {filename}:{line}{sep}");
            }
        }
    }

    let _ = writeln!(out, "{}:{}:{}: {}: {}", file.filename, pos.line, pos.col, level.label(), message);
    let _ = writeln!(out, "{:>5} | {}", pos.line, src.line_text(pos));
    if pos.col > 0 {
        let _ = writeln!(out, "      | {}^", " ".repeat(pos.col as usize));
    } else {
        let _ = writeln!(out, "      | ^");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::source::FileId;

    #[test]
    fn renders_position_line_and_caret() {
        let mut src = SourceState::new();
        src.add_file("main.ika", "int x = y;", None);
        let pos = SourcePos::new(FileId(0), 1, 8);
        let rendered = render(Level::Error, &src, pos, "undeclared identifier 'y'");
        assert!(rendered.contains("main.ika:1:8: error: undeclared identifier 'y'"));
        assert!(rendered.contains("int x = y;"));
        assert!(rendered.ends_with("^\n"));
    }

    #[test]
    fn renders_include_chain_for_a_nested_file() {
        let mut src = SourceState::new();
        let root = src.add_file("main.ika", "#include \"util.ika\"", None);
        let inc_pos = SourcePos::new(root, 1, 10);
        let inner = src.add_file("util.ika", "bad code", Some(inc_pos));
        let pos = SourcePos::new(inner, 1, 1);
        let rendered = render(Level::Error, &src, pos, "parse error");
        assert!(rendered.starts_with("In file included from main.ika:1:\n"));
    }
}
