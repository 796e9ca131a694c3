//! Command-line parsing and typed argument conversion.
//!
//! A submitted line is tokenized on whitespace, the first token is
//! matched exactly against the registry, and the remaining tokens are
//! converted one by one against the matched command's declared schema.
//! Conversion failures are reported to the operator and abandon the
//! line; nothing propagates past the current dispatch iteration.
//!
//! On success the matched descriptor's lock travels inside the returned
//! [`ParsedCommand`] and is released when [`ParsedCommand::invoke`]
//! finishes, serializing concurrent invocations of the same command.

use core::fmt::Write as _;

use spin::MutexGuard;
use vesper_lib::{bytes_as_str, is_space, parse_usize};

use crate::chardev::{OutputDevice, Writer};
use crate::registry::{
    ArgSpec, ArgText, ArgValue, CommandDesc, CommandRegistry, CommandState, InvokeContext,
};
use crate::symtab::{SymbolTable, SymtabError};

/// Whitespace-delimited tokens of a line, in order.
fn tokens(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(|&b| is_space(b)).filter(|t| !t.is_empty())
}

/// A successfully parsed command line, ready to run.
///
/// Holds the descriptor lock acquired during parsing; dropping it (or
/// calling [`invoke`](Self::invoke)) releases the command for the next
/// parse.
pub struct ParsedCommand {
    desc: &'static CommandDesc,
    state: MutexGuard<'static, CommandState>,
    argc: usize,
}

impl ParsedCommand {
    pub fn name(&self) -> &'static str {
        self.desc.name()
    }

    /// The bound argument values, one per schema entry.
    pub fn args(&self) -> &[ArgValue] {
        &self.state.values[..self.argc]
    }

    /// Run the handler with the bound arguments, then release the
    /// descriptor lock held since parsing.
    pub fn invoke(self, out: &dyn OutputDevice) -> i32 {
        let ctx = InvokeContext { out };
        self.state.handler.invoke(&ctx, &self.state.values[..self.argc])
    }
}

/// Parse one line against the registry.
///
/// Returns `None` (after printing a diagnostic, except for the blank
/// line) when the line names no command or its arguments do not fit the
/// schema.
pub fn parse(
    line: &[u8],
    registry: &CommandRegistry,
    symtab: Option<&dyn SymbolTable>,
    out: &dyn OutputDevice,
) -> Option<ParsedCommand> {
    let mut tokens = tokens(line);
    let first = tokens.next()?;

    let Some(desc) = registry.find_exact(first) else {
        out.put_str("Unknown command.\n");
        return None;
    };

    // Held through conversion and, on success, through dispatch.
    let mut state = desc.lock_state();
    let schema = state.schema;

    for (index, spec) in schema.iter().enumerate() {
        let Some(token) = tokens.next() else {
            out.put_str("Too few arguments.\n");
            return None;
        };
        let value = match *spec {
            ArgSpec::Str { cap } => ArgValue::Str(ArgText::from_truncated(token, cap)),
            ArgSpec::Int => ArgValue::Int(convert_int(token, symtab, out)?),
            ArgSpec::Var { cap } => convert_var(token, cap, symtab, out)?,
        };
        state.values[index] = value;
    }

    if tokens.next().is_some() {
        out.put_str("Too many arguments.\n");
        return None;
    }

    let argc = schema.len();
    Some(ParsedCommand { desc, state, argc })
}

/// Convert an integer token.
///
/// `&name` resolves to the symbol's address, bare `name` to the word
/// stored at that address, `*name` to the word the stored word points at.
/// A token whose first character is a digit is an integer literal, with
/// `*` still applying one dereference.
fn convert_int(
    token: &[u8],
    symtab: Option<&dyn SymbolTable>,
    out: &dyn OutputDevice,
) -> Option<usize> {
    let (body, address_of, deref) = match token {
        [b'&', rest @ ..] => (rest, true, false),
        [b'*', rest @ ..] => (rest, false, true),
        _ => (token, false, false),
    };

    if body.first().is_some_and(|b| b.is_ascii_digit()) {
        let Some(value) = parse_usize(body) else {
            let _ = writeln!(Writer(out), "Invalid number {}.", bytes_as_str(body));
            return None;
        };
        return Some(if deref { read_word(value) } else { value });
    }

    let Some(table) = symtab else {
        out.put_str("No symbol information available.\n");
        return None;
    };
    match table.lookup(body) {
        Ok(address) => Some(if address_of {
            address
        } else if deref {
            read_word(read_word(address))
        } else {
            read_word(address)
        }),
        Err(SymtabError::NotFound) => {
            let _ = writeln!(Writer(out), "Symbol {} not found.", bytes_as_str(body));
            None
        }
        Err(SymtabError::Duplicate) => {
            let _ = writeln!(Writer(out), "Duplicate symbol {}.", bytes_as_str(body));
            None
        }
        Err(SymtabError::NotAvailable) => {
            out.put_str("No symbol information available.\n");
            None
        }
    }
}

/// Convert a variadic token: quoted text binds as a string (quotes
/// stripped), anything else goes through integer conversion.
fn convert_var(
    token: &[u8],
    cap: usize,
    symtab: Option<&dyn SymbolTable>,
    out: &dyn OutputDevice,
) -> Option<ArgValue> {
    if token.len() >= 2 && token[0] == b'"' && token[token.len() - 1] == b'"' {
        let inner = &token[1..token.len() - 1];
        return Some(ArgValue::Str(ArgText::from_truncated(inner, cap)));
    }
    match convert_int(token, symtab, out) {
        Some(value) => Some(ArgValue::Int(value)),
        None => {
            out.put_str("Unrecognized variable argument.\n");
            None
        }
    }
}

/// Load one machine word from a resolved address.
fn read_word(address: usize) -> usize {
    // SAFETY: the operator asked the console to load through an address
    // the symbol table resolved (or typed one in). The console is a
    // kernel-privileged debugging tool; this is the documented behavior
    // of the `name`/`*name` argument forms.
    unsafe { core::ptr::read_volatile(address as *const usize) }
}
