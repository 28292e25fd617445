//! `ikac`: an ahead-of-time compiler core for a small C-like systems
//! language, targeting x86-32 AT&T-syntax assembly.
//!
//! This crate is the library half of the split described in its
//! `Cargo.toml`: it never touches stdout/stderr, never initializes a
//! logger, and reports every failure through [`error::Error`] rather
//! than exiting the process. `src/bin/ikac.rs` is the driver that wires
//! this up to a command line.

pub mod arena;
pub mod codegen;
pub mod diagnostic;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod sema;
pub mod symbol;
pub mod types;

use std::path::Path;

use error::Result;
use symbol::{SymbolEntry, SymbolTable};
use types::source::SourceState;

/// Everything a caller needs to turn a parsed-and-checked program into
/// assembly, or to re-render a diagnostic against the original source.
pub struct CompileOutput {
    /// The assembly listing, ready to hand to an external assembler.
    pub assembly: String,
}

/// Run every stage — preprocess, tokenize, parse, type-check, generate —
/// over one file on disk, matching `codegen()`'s single-translation-unit
/// contract. `src` accumulates every file touched (directly or via
/// `#include`) so a caller can render a diagnostic from a returned error
/// via [`diagnostic::render`].
pub fn compile_file(src: &mut SourceState, path: &Path, entry_symbol: &str, target: codegen::TargetOs) -> Result<CompileOutput> {
    log::debug!("compiling {}", path.display());
    let flat = preprocessor::preprocess(src, path)?;
    compile_flattened(&flat, entry_symbol, target)
}

/// Same pipeline as [`compile_file`], but starting from in-memory source
/// text already registered in `src` — the entry point the CLI's `-`
/// (stdin) and the crate's own integration tests use.
pub fn compile_str(src: &mut SourceState, filename: &str, content: &str, entry_symbol: &str, target: codegen::TargetOs) -> Result<CompileOutput> {
    let flat = preprocessor::preprocess_str(src, filename, content);
    compile_flattened(&flat, entry_symbol, target)
}

fn compile_flattened(flat: &preprocessor::Flattened, entry_symbol: &str, target: codegen::TargetOs) -> Result<CompileOutput> {
    let toks = lexer::tokenize(flat)?;

    let mut table = SymbolTable::new();
    let global = table.global();
    let top_level = parser::parse_program(&toks, flat, &mut table)?;

    let functions: Vec<symbol::FuncEntry> = table
        .scope(global)
        .named_entries()
        .into_iter()
        .filter_map(|(_, entry)| match entry {
            SymbolEntry::Func(f) => Some(f),
            _ => None,
        })
        .collect();
    log::trace!("{} top-level function(s) declared", functions.len());

    sema::check(&table, global, &top_level, &functions)?;

    let assembly = codegen::codegen(&table, global, &top_level, entry_symbol, target)?;
    Ok(CompileOutput { assembly })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_program_to_an_entry_label() {
        let mut src = SourceState::new();
        let out = compile_str(&mut src, "test.ika", "fn main() i32 { return 0; }", "main", codegen::TargetOs::Linux).unwrap();
        assert!(out.assembly.contains("main:"));
        assert!(out.assembly.contains("ret"));
    }

    #[test]
    fn reports_semantic_errors_with_a_source_position() {
        let mut src = SourceState::new();
        let err = compile_str(&mut src, "test.ika", "fn main() i32 { return y; }", "main", codegen::TargetOs::Linux).unwrap_err();
        assert_eq!(err.kind(), error::ErrorKind::Semantic);
        assert!(err.pos().is_some());
    }
}
