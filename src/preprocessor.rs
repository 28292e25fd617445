//! Flattens `#include "…"` directives into one source buffer, tracking
//! enough per-line provenance for diagnostics to name the originating
//! file and an "In file included from" chain.
//!
//! Ported loosely from `original_source/src/preprocessor.c`: the original
//! scans character-by-character and drops `#include` lines while
//! splicing in the included file's text; this keeps that behavior but
//! additionally records, for every line of the flattened buffer, which
//! `FileId` and original line number it came from, since the original's
//! flat-buffer design has no notion of the separate `SourceState` this
//! crate builds.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::source::{FileId, SourcePos, SourceState};

/// Ported from `preprocessor.h`'s `MAX_INCLUDE_DEPTH`.
const MAX_INCLUDE_DEPTH: u32 = 200;

/// One line of the flattened buffer and the file/line it was read from.
struct LineOrigin {
    file: FileId,
    line: u32,
}

/// The result of flattening one translation unit: the joined source text
/// and a table mapping each 1-indexed flattened line back to its origin.
pub struct Flattened {
    pub text: String,
    origins: Vec<LineOrigin>,
}

impl Flattened {
    /// Translate a `(flattened_line, col)` pair into a real [`SourcePos`]
    /// naming the file the text actually came from.
    #[must_use]
    pub fn pos(&self, flattened_line: u32, col: u32) -> SourcePos {
        let origin = &self.origins[flattened_line as usize - 1];
        SourcePos::new(origin.file, origin.line, col)
    }
}

/// Read `path`, flatten its `#include`s, and register every file touched
/// (including transitively included ones) in `src`.
pub fn preprocess(src: &mut SourceState, path: &Path) -> Result<Flattened> {
    let mut out = String::new();
    let mut origins = Vec::new();
    expand_file(src, path, None, 0, &mut out, &mut origins)?;
    Ok(Flattened { text: out, origins })
}

fn expand_file(
    src: &mut SourceState,
    path: &Path,
    included_from: Option<SourcePos>,
    depth: u32,
    out: &mut String,
    origins: &mut Vec<LineOrigin>,
) -> Result<()> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(Error::io_msg(format!("#include nested too deeply at {}", path.display())));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io_msg(format!("failed to read {}: {e}", path.display())))?;
    let filename: std::rc::Rc<str> = path.to_string_lossy().into_owned().into();
    let file_id = src.add_file(filename.clone(), &content, included_from);

    for (line_idx, line) in content.split('\n').enumerate() {
        let line_no = (line_idx + 1) as u32;
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("#include") {
            let rest = rest.trim_start();
            let Some(rest) = rest.strip_prefix('"') else {
                return Err(Error::io_msg(format!("{}:{line_no}: #include expects \"FILENAME\"", filename)));
            };
            let Some(end) = rest.find('"') else {
                return Err(Error::io_msg(format!("{}:{line_no}: missing terminating \" character", filename)));
            };
            let include_name = &rest[..end];
            let col = (line.len() - trimmed.len() + "#include \"".len()) as u32;
            let inc_pos = SourcePos::new(file_id, line_no, col);
            let include_path = resolve_include(path, include_name);
            expand_file(src, &include_path, Some(inc_pos), depth + 1, out, origins)?;
            continue;
        }
        out.push_str(line);
        out.push('\n');
        origins.push(LineOrigin { file: file_id, line: line_no });
    }

    Ok(())
}

fn resolve_include(including: &Path, name: &str) -> PathBuf {
    including.parent().map_or_else(|| PathBuf::from(name), |dir| dir.join(name))
}

/// Flatten a string directly, with no `#include` expansion, for tests
/// and for callers that already have source text in memory.
#[cfg(test)]
pub fn preprocess_str(src: &mut SourceState, filename: &str, content: &str) -> Flattened {
    let file_id = src.add_file(filename, content, None);
    let mut out = String::new();
    let mut origins = Vec::new();
    for (line_idx, line) in content.split('\n').enumerate() {
        out.push_str(line);
        out.push('\n');
        origins.push(LineOrigin { file: file_id, line: (line_idx + 1) as u32 });
    }
    Flattened { text: out, origins }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flattens_a_single_level_include() {
        let dir = tempfile::tempdir().unwrap();
        let inc_path = dir.path().join("util.ika");
        std::fs::File::create(&inc_path).unwrap().write_all(b"i32 helper = 1;\n").unwrap();
        let main_path = dir.path().join("main.ika");
        std::fs::File::create(&main_path).unwrap().write_all(b"#include \"util.ika\"\ni32 x = 2;\n").unwrap();

        let mut src = SourceState::new();
        let flat = preprocess(&mut src, &main_path).unwrap();
        assert_eq!(flat.text, "i32 helper = 1;\ni32 x = 2;\n");

        let origin_line_1 = flat.pos(1, 0);
        assert_eq!(src.file(origin_line_1.file).filename.as_ref(), inc_path.to_string_lossy());
        let origin_line_2 = flat.pos(2, 0);
        assert_eq!(src.file(origin_line_2.file).filename.as_ref(), main_path.to_string_lossy());
    }

    #[test]
    fn rejects_unterminated_include_filename() {
        let dir = tempfile::tempdir().unwrap();
        let main_path = dir.path().join("main.ika");
        std::fs::File::create(&main_path).unwrap().write_all(b"#include \"oops\n").unwrap();
        let mut src = SourceState::new();
        assert!(preprocess(&mut src, &main_path).is_err());
    }
}
