//! Word completion over the command and symbol namespaces.
//!
//! Given the partial word under the caret, the engine enumerates every
//! matching entry through a resumable prefix scan (never holding a lock
//! while printing), narrows the matches down to their longest common
//! extension beyond the prefix, and — when several matches share no
//! extension at all — lists the candidates so the operator can pick one.

use core::fmt::Write as _;

use crate::chardev::{OutputDevice, Writer};
use crate::registry::{CommandRegistry, ScanCursor};
use crate::symtab::SymbolTable;

/// Capacity of the common-extension text.
pub const HINT_MAX: usize = 128;

/// The longest common extension shared by all matches, possibly empty.
#[derive(Clone, Copy)]
pub struct Hint {
    buf: [u8; HINT_MAX],
    len: usize,
}

impl Hint {
    pub const fn empty() -> Self {
        Self {
            buf: [0; HINT_MAX],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First match: the whole suffix becomes the candidate extension.
    fn set(&mut self, suffix: &[u8]) {
        self.len = suffix.len().min(HINT_MAX);
        self.buf[..self.len].copy_from_slice(&suffix[..self.len]);
    }

    /// Subsequent match: shrink to the longest prefix shared with it.
    fn merge(&mut self, suffix: &[u8]) {
        let mut common = 0;
        while common < self.len && common < suffix.len() && self.buf[common] == suffix[common] {
            common += 1;
        }
        self.len = common;
    }
}

/// Outcome of one completion request.
pub struct Completion {
    /// Number of entries sharing the prefix.
    pub count: usize,
    pub hint: Hint,
}

impl Completion {
    const fn none() -> Self {
        Self {
            count: 0,
            hint: Hint::empty(),
        }
    }
}

/// Complete `prefix` against registered command names.
///
/// With more than one match and no common extension, prints each
/// candidate as `name - description` before returning.
pub fn complete_command(
    registry: &CommandRegistry,
    prefix: &[u8],
    out: &dyn OutputDevice,
) -> Completion {
    let mut result = Completion::none();

    let mut cursor = ScanCursor::start();
    while let Some(cmd) = registry.next_prefix_match(prefix, &mut cursor) {
        let suffix = &cmd.name().as_bytes()[prefix.len()..];
        if result.count == 0 {
            result.hint.set(suffix);
        } else {
            result.hint.merge(suffix);
        }
        result.count += 1;
    }

    if result.count > 1 && result.hint.is_empty() {
        out.putchar(b'\n');
        let mut cursor = ScanCursor::start();
        while let Some(cmd) = registry.next_prefix_match(prefix, &mut cursor) {
            let _ = writeln!(Writer(out), "{} - {}", cmd.name(), cmd.description());
        }
    }

    result
}

/// Complete `prefix` against the kernel symbol table, if one exists.
///
/// The ambiguity listing prints bare symbol names.
pub fn complete_symbol(
    symtab: Option<&dyn SymbolTable>,
    prefix: &[u8],
    out: &dyn OutputDevice,
) -> Completion {
    let Some(table) = symtab else {
        return Completion::none();
    };

    let mut result = Completion::none();
    let mut cursor = 0usize;
    while let Some(name) = table.next_prefix_match(prefix, &mut cursor) {
        let suffix = &name.as_bytes()[prefix.len()..];
        if result.count == 0 {
            result.hint.set(suffix);
        } else {
            result.hint.merge(suffix);
        }
        result.count += 1;
    }

    if result.count > 1 && result.hint.is_empty() {
        out.putchar(b'\n');
        let mut cursor = 0usize;
        while let Some(name) = table.next_prefix_match(prefix, &mut cursor) {
            let _ = writeln!(Writer(out), "{name}");
        }
    }

    result
}
