//! Interactive kernel debug console.
//!
//! The console understands no useful command on its own: kernel
//! subsystems describe their commands in static [`CommandDesc`] records
//! and register them with the shared [`CommandRegistry`], at any point —
//! including before the console's own thread exists. One dedicated
//! execution context then runs [`Console::run`], which blocks on the
//! input device, line-edits with history and tab completion, parses the
//! submitted line against the matched command's argument schema, and
//! invokes the handler.
//!
//! The console must stay usable when everything else is on fire: it is
//! entered from panic handling as well as interactively, never allocates
//! per keystroke, and reports every operator mistake as console text
//! rather than an error that could propagate.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod chardev;
pub mod completion;
pub mod editor;
pub mod parser;
pub mod registry;
pub mod symtab;

#[cfg(test)]
pub(crate) mod testdev;

use vesper_lib::{Sysinfo, klog_debug};

pub use chardev::{InputDevice, OutputDevice, Writer};
pub use completion::{Completion, Hint};
pub use editor::{HISTORY_DEPTH, LineBuffer, LineEditor, MAX_CMDLINE};
pub use parser::{ParsedCommand, parse};
pub use registry::{
    ARG_STR_MAX, ArgSpec, ArgText, ArgValue, CommandDesc, CommandHandler, CommandRegistry,
    InvokeContext, MAX_ARGS, ScanCursor,
};
pub use symtab::{SymbolTable, SymtabError};

/// Virtual interrupt number advertised through sysinfo. There is no real
/// interrupt line behind the console; the number only gives userspace
/// bridges something to name.
pub const KCON_VIRT_INR: usize = 0;

/// The console service object.
///
/// Constructed once by the embedding kernel from its registry, character
/// device and (optional) symbol table, then driven by a dedicated thread
/// or entered directly from panic handling.
pub struct Console<'a> {
    registry: &'a CommandRegistry,
    input: &'a dyn InputDevice,
    output: &'a dyn OutputDevice,
    symtab: Option<&'a dyn SymbolTable>,
    editor: LineEditor,
}

impl<'a> Console<'a> {
    pub fn new(
        registry: &'a CommandRegistry,
        input: &'a dyn InputDevice,
        output: &'a dyn OutputDevice,
        symtab: Option<&'a dyn SymbolTable>,
    ) -> Self {
        Self {
            registry,
            input,
            output,
            symtab,
            editor: LineEditor::new(),
        }
    }

    /// True when an input byte is already waiting. Lets the kernel check
    /// for console activation without committing to a blocking read.
    pub fn input_pending(&self) -> bool {
        self.input.poll_ready()
    }

    /// Advertise the console through the system information registry.
    /// Called once at startup, after the registry service exists.
    pub fn publish_presence(&self, sysinfo: &Sysinfo) {
        sysinfo.set("kcon.present", 1);
        sysinfo.set("kcon.inr", KCON_VIRT_INR);
    }

    /// The dispatch loop: prompt, read, parse, invoke, repeat.
    ///
    /// `name` becomes the prompt. `banner` is printed first when given.
    /// With `forced` set (panic or trap context) the loop waits for one
    /// keypress before the first prompt and never returns — the console
    /// is the only operator interface left. Interactively (`forced`
    /// false) the literal line `exit` ends the session.
    pub fn run(&mut self, name: &str, banner: Option<&str>, forced: bool) {
        if let Some(banner) = banner {
            self.output.put_str(banner);
        }

        if forced {
            let _ = self.input.getc();
        } else {
            self.output.put_str("Type \"exit\" to leave the console.\n");
        }

        loop {
            let line = self
                .editor
                .read_line(self.input, self.output, self.registry, self.symtab, name);
            if line.is_empty() {
                continue;
            }
            if !forced && line == b"exit" {
                break;
            }

            let Some(parsed) = parser::parse(line, self.registry, self.symtab, self.output)
            else {
                continue;
            };
            let cmd_name = parsed.name();
            let status = parsed.invoke(self.output);
            klog_debug!("kcon: command '{}' returned {}", cmd_name, status);
        }
    }
}
