//! Test doubles for the console's external seams: scripted input,
//! captured output, a table-backed symbol table, and descriptor
//! factories. Host tests only.

use std::boxed::Box;
use std::collections::VecDeque;
use std::vec::Vec;

use spin::Mutex;

use crate::chardev::{InputDevice, OutputDevice};
use crate::registry::{ArgSpec, ArgValue, CommandDesc, CommandHandler, InvokeContext};
use crate::symtab::{SymbolTable, SymtabError};

/// Input device that replays a fixed byte script.
pub(crate) struct ScriptedInput {
    bytes: Mutex<VecDeque<u8>>,
}

impl ScriptedInput {
    pub(crate) fn new(script: &[u8]) -> Self {
        Self {
            bytes: Mutex::new(script.iter().copied().collect()),
        }
    }
}

impl InputDevice for ScriptedInput {
    fn getc(&self) -> u8 {
        self.bytes.lock().pop_front().expect("input script exhausted")
    }

    fn poll_ready(&self) -> bool {
        !self.bytes.lock().is_empty()
    }
}

/// Output device that accumulates everything written to it.
pub(crate) struct CaptureOutput {
    bytes: Mutex<Vec<u8>>,
}

impl CaptureOutput {
    pub(crate) fn new() -> Self {
        Self {
            bytes: Mutex::new(Vec::new()),
        }
    }

    /// Drain and return the captured bytes.
    pub(crate) fn take(&self) -> Vec<u8> {
        core::mem::take(&mut *self.bytes.lock())
    }
}

impl OutputDevice for CaptureOutput {
    fn putchar(&self, byte: u8) {
        self.bytes.lock().push(byte);
    }
}

struct NopHandler;

impl CommandHandler for NopHandler {
    fn invoke(&self, _ctx: &InvokeContext<'_>, _args: &[ArgValue]) -> i32 {
        0
    }
}

static NOP: NopHandler = NopHandler;

/// A no-argument descriptor with a do-nothing handler.
pub(crate) fn nop_desc(name: &'static str, description: &'static str) -> &'static CommandDesc {
    Box::leak(Box::new(CommandDesc::new(name, description, &[], &NOP)))
}

/// A descriptor with the given schema and a do-nothing handler.
pub(crate) fn desc_with(name: &'static str, schema: &'static [ArgSpec]) -> &'static CommandDesc {
    Box::leak(Box::new(CommandDesc::new(name, "", schema, &NOP)))
}

/// Symbol table backed by a plain lookup table.
pub(crate) struct TestSymtab {
    entries: Vec<(&'static str, usize)>,
    duplicates: Vec<&'static str>,
}

impl TestSymtab {
    pub(crate) fn new(entries: &[(&'static str, usize)]) -> Self {
        Self {
            entries: entries.to_vec(),
            duplicates: Vec::new(),
        }
    }

    /// Mark `name` as ambiguous: lookups report `Duplicate`.
    pub(crate) fn with_duplicate(mut self, name: &'static str) -> Self {
        self.duplicates.push(name);
        self
    }
}

impl SymbolTable for TestSymtab {
    fn lookup(&self, name: &[u8]) -> Result<usize, SymtabError> {
        if self.duplicates.iter().any(|dup| dup.as_bytes() == name) {
            return Err(SymtabError::Duplicate);
        }
        self.entries
            .iter()
            .find(|(entry, _)| entry.as_bytes() == name)
            .map(|(_, address)| *address)
            .ok_or(SymtabError::NotFound)
    }

    fn next_prefix_match(&self, prefix: &[u8], cursor: &mut usize) -> Option<&'static str> {
        while *cursor < self.entries.len() {
            let (name, _) = self.entries[*cursor];
            *cursor += 1;
            if name.as_bytes().starts_with(prefix) {
                return Some(name);
            }
        }
        None
    }
}
