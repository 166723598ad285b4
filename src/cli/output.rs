//! Reading and writing what the CLI exchanges with files and streams.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::diagnostics::Diagnostic;
use crate::errors::MapperError;

/// Writes `text` to `path`, or to stdout without one.
pub fn write_text(text: &str, path: Option<&Path>) -> Result<(), MapperError> {
    match path {
        Some(path) => fs::write(path, text)?,
        None => io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}

/// One wire line per diagnostic.
pub fn write_diagnostics(out: &mut impl Write, diagnostics: &[Diagnostic]) -> io::Result<()> {
    for diagnostic in diagnostics {
        writeln!(out, "{}", diagnostic.to_wire())?;
    }
    Ok(())
}

/// Parses wire lines, skipping blank ones.
pub fn read_diagnostics(text: &str) -> Result<Vec<Diagnostic>, MapperError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(Diagnostic::from_wire)
        .collect()
}
