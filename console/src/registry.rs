//! Command descriptors and the shared command registry.
//!
//! Subsystems describe a console command once, in static storage, and hand
//! the registry a reference. The registry owns nothing: it keeps a list of
//! links into caller-owned descriptors, and descriptors are never removed.
//!
//! # Locking
//!
//! Two levels. The registry lock guards the link list; each descriptor's
//! lock guards its mutable state (argument schema, converted argument
//! values, handler). The registry lock is acquired before any descriptor
//! lock. When the duplicate scan needs two descriptor locks at once they
//! are taken in ascending registration-sequence order, a stable total
//! order that does not depend on memory addresses. Nothing enforces this
//! at compile time; the concurrency tests below exist to keep it honest.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use spin::{Mutex, MutexGuard};
use vesper_lib::{bytes_as_str, klog_debug};

use crate::chardev::OutputDevice;

/// Upper bound on declared arguments per command.
pub const MAX_ARGS: usize = 4;

/// Backing capacity for one bounded argument string.
pub const ARG_STR_MAX: usize = 64;

/// Declared shape of one positional argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgSpec {
    /// Free text, kept up to `cap - 1` bytes (silently truncated).
    Str { cap: usize },
    /// Machine word: integer literal or symbol reference.
    Int,
    /// Either of the above, decided per invocation by the token's shape.
    Var { cap: usize },
}

/// Capacity-bounded owned argument text.
#[derive(Clone, Copy, Debug)]
pub struct ArgText {
    buf: [u8; ARG_STR_MAX],
    len: usize,
}

impl ArgText {
    pub const fn empty() -> Self {
        Self {
            buf: [0; ARG_STR_MAX],
            len: 0,
        }
    }

    /// Copy `text`, keeping at most `cap - 1` bytes. Truncation is not an
    /// error: the operator sees the shortened value, nothing else.
    pub fn from_truncated(text: &[u8], cap: usize) -> Self {
        let cap = cap.min(ARG_STR_MAX);
        let keep = text.len().min(cap.saturating_sub(1));
        let mut out = Self::empty();
        out.buf[..keep].copy_from_slice(&text[..keep]);
        out.len = keep;
        out
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_str(&self) -> &str {
        bytes_as_str(self.as_bytes())
    }
}

/// One converted argument as delivered to a handler. For a [`ArgSpec::Var`]
/// argument the discriminant records which alternative was produced.
#[derive(Clone, Copy, Debug)]
pub enum ArgValue {
    /// Slot not bound by the current invocation.
    None,
    Int(usize),
    Str(ArgText),
}

/// Everything a handler gets besides its arguments.
///
/// Deliberately narrow: handlers run with their descriptor lock held and
/// must not call back into the registry (lock order is registry first).
pub struct InvokeContext<'a> {
    pub out: &'a dyn OutputDevice,
}

/// A console command implementation.
pub trait CommandHandler: Sync {
    /// Execute with the bound arguments. The status is logged by the
    /// dispatch loop and otherwise ignored.
    fn invoke(&self, ctx: &InvokeContext<'_>, args: &[ArgValue]) -> i32;
}

/// Mutable descriptor state, guarded by the per-descriptor lock.
pub(crate) struct CommandState {
    pub(crate) schema: &'static [ArgSpec],
    pub(crate) values: [ArgValue; MAX_ARGS],
    pub(crate) handler: &'static dyn CommandHandler,
}

/// One registrable console command. Created by the owning subsystem in
/// static storage and registered exactly once; must stay valid for the
/// lifetime of the kernel.
pub struct CommandDesc {
    name: &'static str,
    description: &'static str,
    /// Stable identity for descriptor lock ordering. 0 until registered.
    seq: AtomicU32,
    state: Mutex<CommandState>,
}

impl CommandDesc {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        schema: &'static [ArgSpec],
        handler: &'static dyn CommandHandler,
    ) -> Self {
        assert!(schema.len() <= MAX_ARGS);
        Self {
            name,
            description,
            seq: AtomicU32::new(0),
            state: Mutex::new(CommandState {
                schema,
                values: [ArgValue::None; MAX_ARGS],
                handler,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, CommandState> {
        self.state.lock()
    }

    fn order_key(&self) -> u32 {
        match self.seq.load(Ordering::Acquire) {
            0 => u32::MAX,
            seq => seq,
        }
    }
}

/// Registration-time name comparison: truncated to the shared length, so
/// a name that is a prefix of another collides with it, in both
/// directions ("dump" vs "dumpall" collide at length 4).
fn names_collide(a: &[u8], b: &[u8]) -> bool {
    let shared = a.len().min(b.len());
    a[..shared] == b[..shared]
}

/// Lookup-time name comparison: byte equality over the longer of both
/// lengths, where positions past a name's end never match. A longer typed
/// token therefore never matches a shorter registered name, and vice
/// versa. Intentionally different from [`names_collide`]; do not unify.
fn name_matches(registered: &[u8], typed: &[u8]) -> bool {
    registered.len() == typed.len() && registered == typed
}

/// Opaque resumable position for [`CommandRegistry::next_prefix_match`].
pub struct ScanCursor(usize);

impl ScanCursor {
    pub const fn start() -> Self {
        Self(0)
    }
}

/// The shared collection of registered commands.
pub struct CommandRegistry {
    entries: Mutex<Vec<&'static CommandDesc>>,
    next_seq: AtomicU32,
}

impl CommandRegistry {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_seq: AtomicU32::new(1),
        }
    }

    /// Insert a command unless it collides with an existing entry.
    ///
    /// Collisions: the same descriptor instance again, or a name that is
    /// equal to a registered name up to the shorter length. Conflicts are
    /// reported to the caller only; the operator sees nothing.
    pub fn register(&self, cmd: &'static CommandDesc) -> bool {
        let mut entries = self.entries.lock();
        for &existing in entries.iter() {
            if core::ptr::eq(existing, cmd) {
                klog_debug!("kcon: command '{}' already registered", cmd.name);
                return false;
            }
            let collides = {
                let _locks = lock_pair(existing, cmd);
                names_collide(existing.name.as_bytes(), cmd.name.as_bytes())
            };
            if collides {
                klog_debug!(
                    "kcon: command '{}' collides with '{}'",
                    cmd.name,
                    existing.name
                );
                return false;
            }
        }

        cmd.seq
            .store(self.next_seq.fetch_add(1, Ordering::Relaxed), Ordering::Release);
        entries.push(cmd);
        true
    }

    /// Exact-match lookup of a typed command token.
    pub fn find_exact(&self, name: &[u8]) -> Option<&'static CommandDesc> {
        let entries = self.entries.lock();
        entries
            .iter()
            .copied()
            .find(|cmd| name_matches(cmd.name.as_bytes(), name))
    }

    /// Resumable prefix scan, in registration order.
    ///
    /// The registry lock is held only for the duration of one call, so a
    /// caller can print between matches. Entries registered between calls
    /// may or may not be seen; matches are advisory.
    pub fn next_prefix_match(
        &self,
        prefix: &[u8],
        cursor: &mut ScanCursor,
    ) -> Option<&'static CommandDesc> {
        let entries = self.entries.lock();
        while cursor.0 < entries.len() {
            let cmd = entries[cursor.0];
            cursor.0 += 1;
            if cmd.name.as_bytes().starts_with(prefix) {
                return Some(cmd);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Acquire two descriptor locks in ascending sequence order. Unregistered
/// descriptors (seq 0) order last, so the duplicate-check pair is always
/// taken existing-then-new regardless of which argument is which.
fn lock_pair<'a>(
    a: &'a CommandDesc,
    b: &'a CommandDesc,
) -> (MutexGuard<'a, CommandState>, MutexGuard<'a, CommandState>) {
    if a.order_key() <= b.order_key() {
        let first = a.state.lock();
        let second = b.state.lock();
        (first, second)
    } else {
        let first = b.state.lock();
        let second = a.state.lock();
        (first, second)
    }
}
