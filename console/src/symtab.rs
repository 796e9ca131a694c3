//! Symbol table seam.
//!
//! The kernel's symbol table (when one was linked in) resolves names to
//! addresses for the `&name` / `name` / `*name` argument forms and feeds
//! symbol-name tab completion. The console only ever talks to this trait;
//! a kernel built without symbol information simply passes no table.

/// Why a symbol lookup produced no address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymtabError {
    /// No symbol with that exact name.
    NotFound,
    /// More than one symbol carries the name; the address is ambiguous.
    Duplicate,
    /// No symbol information was compiled into this kernel.
    NotAvailable,
}

pub trait SymbolTable: Sync {
    /// Resolve `name` to its address.
    fn lookup(&self, name: &[u8]) -> Result<usize, SymtabError>;

    /// Resumable prefix scan over symbol names.
    ///
    /// `cursor` starts at 0 and is advanced past each returned match, so
    /// repeated calls enumerate every symbol beginning with `prefix`.
    /// The table may change between calls; matches are advisory.
    fn next_prefix_match(&self, prefix: &[u8], cursor: &mut usize) -> Option<&'static str>;
}
