//! Raw-mode line editing over the console character device.
//!
//! One blocking read session produces one submitted line. The session
//! edits a history ring slot *in place*: navigating with up/down switches
//! which slot is current, and typing rewrites that slot directly — a
//! long-standing console behavior that editing a recalled line also
//! rewrites the stored history entry.
//!
//! Escape sequences are consumed one byte per state-machine transition
//! (`Normal -> Esc -> Csi [-> CsiDelete]`), never by nested reads.

use vesper_lib::is_space;

use crate::chardev::{InputDevice, OutputDevice};
use crate::completion::{self, Completion};
use crate::registry::CommandRegistry;
use crate::symtab::SymbolTable;

/// Maximum editable line length.
pub const MAX_CMDLINE: usize = 256;

/// Number of remembered command lines.
pub const HISTORY_DEPTH: usize = 8;

const BS: u8 = 0x08;

/// Owned, capacity-bounded editable line.
///
/// Insertion past capacity is a silent no-op: the operator's keystroke is
/// ignored rather than reported. Invariant: `len <= MAX_CMDLINE`.
#[derive(Clone, Copy)]
pub struct LineBuffer {
    bytes: [u8; MAX_CMDLINE],
    len: usize,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; MAX_CMDLINE],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Insert `byte` at `pos`, shifting the tail right. Returns `false`
    /// (and changes nothing) when the buffer is full.
    pub fn insert_at(&mut self, pos: usize, byte: u8) -> bool {
        debug_assert!(pos <= self.len);
        if self.len >= MAX_CMDLINE {
            return false;
        }
        self.bytes.copy_within(pos..self.len, pos + 1);
        self.bytes[pos] = byte;
        self.len += 1;
        true
    }

    /// Remove the byte at `pos`, shifting the tail left.
    pub fn remove_at(&mut self, pos: usize) {
        debug_assert!(pos < self.len);
        self.bytes.copy_within(pos + 1..self.len, pos);
        self.len -= 1;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Circular history storage. A single cursor serves as both the write
/// position (the slot currently under edit) and the navigation position.
struct History {
    slots: [LineBuffer; HISTORY_DEPTH],
    pos: usize,
}

impl History {
    const fn new() -> Self {
        Self {
            slots: [LineBuffer::new(); HISTORY_DEPTH],
            pos: 0,
        }
    }

    fn current(&self) -> &LineBuffer {
        &self.slots[self.pos]
    }

    fn current_mut(&mut self) -> &mut LineBuffer {
        &mut self.slots[self.pos]
    }

    fn back(&mut self) {
        self.pos = (self.pos + HISTORY_DEPTH - 1) % HISTORY_DEPTH;
    }

    fn forward(&mut self) {
        self.pos = (self.pos + 1) % HISTORY_DEPTH;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EscState {
    Normal,
    /// ESC seen, waiting for the introducer.
    Esc,
    /// `ESC [` or `ESC O` seen, waiting for the final byte.
    Csi,
    /// `ESC [ 3` seen, waiting for `~` (delete-forward).
    CsiDelete,
}

/// The line editor. Owns the history ring; everything else is borrowed
/// per session.
pub struct LineEditor {
    history: History,
}

impl LineEditor {
    pub const fn new() -> Self {
        Self {
            history: History::new(),
        }
    }

    /// Read one line, blocking on every input byte. Echoes edits, serves
    /// history navigation and tab completion, and returns the submitted
    /// line (which is also the now-current history entry when non-empty).
    pub fn read_line(
        &mut self,
        input: &dyn InputDevice,
        out: &dyn OutputDevice,
        registry: &CommandRegistry,
        symtab: Option<&dyn SymbolTable>,
        prompt: &str,
    ) -> &[u8] {
        print_prompt(out, prompt);
        self.history.current_mut().clear();
        let mut caret = 0usize;
        let mut esc = EscState::Normal;

        loop {
            let byte = input.getc();
            match esc {
                EscState::Normal => match byte {
                    b'\n' | b'\r' => {
                        out.putchar(b'\n');
                        break;
                    }
                    BS | 0x7f => self.backspace(out, &mut caret),
                    b'\t' => self.complete_word(out, registry, symtab, prompt, &mut caret),
                    0x1b => esc = EscState::Esc,
                    0x20..=0x7e => self.insert(out, &mut caret, byte),
                    _ => {}
                },
                EscState::Esc => {
                    esc = if byte == b'[' || byte == b'O' {
                        EscState::Csi
                    } else {
                        EscState::Normal
                    };
                }
                EscState::Csi => {
                    esc = EscState::Normal;
                    match byte {
                        b'3' => esc = EscState::CsiDelete,
                        b'H' => {
                            echo_repeat(out, BS, caret);
                            caret = 0;
                        }
                        b'F' => {
                            let line = self.history.current();
                            out.put_bytes(&line.as_bytes()[caret..]);
                            caret = line.len();
                        }
                        b'D' => {
                            if caret > 0 {
                                out.putchar(BS);
                                caret -= 1;
                            }
                        }
                        b'C' => {
                            let line = self.history.current();
                            if caret < line.len() {
                                out.putchar(line.as_bytes()[caret]);
                                caret += 1;
                            }
                        }
                        b'A' | b'B' => self.navigate(out, &mut caret, byte == b'A'),
                        _ => {}
                    }
                }
                EscState::CsiDelete => {
                    if byte == b'~' {
                        self.delete_forward(out, caret);
                    }
                    esc = EscState::Normal;
                }
            }
        }

        let submitted = self.history.pos;
        if !self.history.current().is_empty() {
            self.history.forward();
        }
        self.history.slots[submitted].as_bytes()
    }

    /// Insert a printable byte at the caret, echoing the shifted tail.
    fn insert(&mut self, out: &dyn OutputDevice, caret: &mut usize, byte: u8) {
        let line = self.history.current_mut();
        if !line.insert_at(*caret, byte) {
            return;
        }
        out.put_bytes(&line.as_bytes()[*caret..]);
        *caret += 1;
        echo_repeat(out, BS, line.len() - *caret);
    }

    /// Delete the byte left of the caret, redrawing from the caret on.
    fn backspace(&mut self, out: &dyn OutputDevice, caret: &mut usize) {
        if *caret == 0 {
            return;
        }
        let line = self.history.current_mut();
        line.remove_at(*caret - 1);
        *caret -= 1;
        out.putchar(BS);
        out.put_bytes(&line.as_bytes()[*caret..]);
        out.putchar(b' ');
        echo_repeat(out, BS, line.len() - *caret + 1);
    }

    /// Delete the byte under the caret (forward delete).
    fn delete_forward(&mut self, out: &dyn OutputDevice, caret: usize) {
        let line = self.history.current_mut();
        if caret >= line.len() {
            return;
        }
        line.remove_at(caret);
        out.put_bytes(&line.as_bytes()[caret..]);
        out.putchar(b' ');
        echo_repeat(out, BS, line.len() - caret + 1);
    }

    /// History previous/next: erase the visual line, switch slots, echo
    /// the recalled entry with the caret at its end.
    fn navigate(&mut self, out: &dyn OutputDevice, caret: &mut usize, previous: bool) {
        let len = self.history.current().len();
        echo_repeat(out, BS, *caret);
        echo_repeat(out, b' ', len);
        echo_repeat(out, BS, len);

        if previous {
            self.history.back();
        } else {
            self.history.forward();
        }

        let line = self.history.current();
        out.put_bytes(line.as_bytes());
        *caret = line.len();
    }

    /// Tab: extend the caret to the end of the current word, complete the
    /// word against the command namespace (first word) or the symbol
    /// namespace (any later word, leading `&`/`*` sigil ignored), and
    /// insert whatever common extension came back.
    fn complete_word(
        &mut self,
        out: &dyn OutputDevice,
        registry: &CommandRegistry,
        symtab: Option<&dyn SymbolTable>,
        prompt: &str,
        caret: &mut usize,
    ) {
        let mut word = [0u8; MAX_CMDLINE];
        let (word_len, first_word) = {
            let line = self.history.current();
            let bytes = line.as_bytes();

            // Walk the caret to the right edge of the word, echoing.
            while *caret < bytes.len() && !is_space(bytes[*caret]) {
                out.putchar(bytes[*caret]);
                *caret += 1;
            }

            let mut start = *caret;
            while start > 0 && !is_space(bytes[start - 1]) {
                start -= 1;
            }
            let first_word = bytes[..start].iter().all(|&b| is_space(b));

            // Symbol words may carry an address-of/dereference sigil that
            // is not part of the name.
            if !first_word && start < *caret && (bytes[start] == b'&' || bytes[start] == b'*') {
                start += 1;
            }

            let word_len = *caret - start;
            word[..word_len].copy_from_slice(&bytes[start..*caret]);
            (word_len, first_word)
        };
        let prefix = &word[..word_len];

        let Completion { count, hint } = if first_word {
            completion::complete_command(registry, prefix, out)
        } else {
            completion::complete_symbol(symtab, prefix, out)
        };
        if count == 0 {
            return;
        }

        if count > 1 && hint.is_empty() {
            // The engine listed the candidates; start a fresh prompt line
            // and redraw the input.
            print_prompt(out, prompt);
            let line = self.history.current();
            out.put_bytes(line.as_bytes());
            echo_repeat(out, BS, line.len() - *caret);
            return;
        }

        let inserted = {
            let line = self.history.current_mut();
            let mut n = 0;
            for &b in hint.as_bytes() {
                if !line.insert_at(*caret + n, b) {
                    break;
                }
                n += 1;
            }
            n
        };

        let line = self.history.current();
        out.put_bytes(&line.as_bytes()[*caret..]);
        *caret += inserted;

        // A unique match that fills the word at the end of the line gets
        // a trailing separator so the operator can keep typing arguments.
        if count == 1 && *caret == line.len() {
            let line = self.history.current_mut();
            if line.insert_at(*caret, b' ') {
                *caret += 1;
                out.putchar(b' ');
            }
        }

        let len = self.history.current().len();
        echo_repeat(out, BS, len - *caret);
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

fn print_prompt(out: &dyn OutputDevice, prompt: &str) {
    out.put_str(prompt);
    out.put_str("> ");
}

fn echo_repeat(out: &dyn OutputDevice, byte: u8, count: usize) {
    for _ in 0..count {
        out.putchar(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdev::{CaptureOutput, ScriptedInput, TestSymtab, nop_desc};

    fn read(editor: &mut LineEditor, script: &[u8]) -> std::vec::Vec<u8> {
        let input = ScriptedInput::new(script);
        let out = CaptureOutput::new();
        let registry = CommandRegistry::new();
        editor
            .read_line(&input, &out, &registry, None, "kcon")
            .to_vec()
    }

    fn read_with(
        editor: &mut LineEditor,
        script: &[u8],
        registry: &CommandRegistry,
        symtab: Option<&dyn SymbolTable>,
    ) -> (std::vec::Vec<u8>, std::vec::Vec<u8>) {
        let input = ScriptedInput::new(script);
        let out = CaptureOutput::new();
        let line = editor
            .read_line(&input, &out, registry, symtab, "kcon")
            .to_vec();
        (line, out.take())
    }

    #[test]
    fn plain_line_is_returned() {
        let mut editor = LineEditor::new();
        assert_eq!(read(&mut editor, b"zones\n"), b"zones");
    }

    #[test]
    fn backspace_round_trips() {
        let mut editor = LineEditor::new();
        // Type "halts", erase the stray byte, submit.
        assert_eq!(read(&mut editor, b"halts\x08\n"), b"halt");
        // Erasing everything restores the empty line.
        assert_eq!(read(&mut editor, b"ab\x08\x08\n"), b"");
        // Backspace on an empty line is a no-op.
        assert_eq!(read(&mut editor, b"\x08ok\n"), b"ok");
    }

    #[test]
    fn caret_movement_edits_in_place() {
        let mut editor = LineEditor::new();
        // "tsk", left twice, insert 'a' -> "task".
        assert_eq!(read(&mut editor, b"tsk\x1b[D\x1b[Da\n"), b"task");
        // Walking left past column zero stays at column zero.
        assert_eq!(read(&mut editor, b"z\x1b[D\x1b[D\x1b[Da\n"), b"az");
        // Home then 'x': insertion at column zero.
        assert_eq!(read(&mut editor, b"bc\x1b[Ha\n"), b"abc");
        // Home, End round trip leaves the line alone.
        assert_eq!(read(&mut editor, b"ok\x1b[H\x1b[F!\n"), b"ok!");
        // ESC O introducer works like ESC [.
        assert_eq!(read(&mut editor, b"bc\x1bOHa\n"), b"abc");
    }

    #[test]
    fn delete_forward_removes_under_caret() {
        let mut editor = LineEditor::new();
        // Home, delete: drops the first byte.
        assert_eq!(read(&mut editor, b"xok\x1b[H\x1b[3~\n"), b"ok");
        // Delete at end of line is a no-op.
        assert_eq!(read(&mut editor, b"ok\x1b[3~\n"), b"ok");
    }

    #[test]
    fn overlong_input_is_ignored() {
        let mut editor = LineEditor::new();
        let mut script = std::vec![b'a'; MAX_CMDLINE + 10];
        script.push(b'\n');
        let line = read(&mut editor, &script);
        assert_eq!(line.len(), MAX_CMDLINE);
    }

    #[test]
    fn control_bytes_are_ignored() {
        let mut editor = LineEditor::new();
        assert_eq!(read(&mut editor, b"a\x01\x02\x7fb\x06c\n"), b"bc");
    }

    #[test]
    fn history_recalls_recent_lines_in_reverse() {
        let mut editor = LineEditor::new();
        assert_eq!(read(&mut editor, b"first\n"), b"first");
        assert_eq!(read(&mut editor, b"second\n"), b"second");
        assert_eq!(read(&mut editor, b"third\n"), b"third");

        // One up: most recent line.
        assert_eq!(read(&mut editor, b"\x1b[A\n"), b"third");
        // The recall re-submitted "third", so two ups skip past it.
        assert_eq!(read(&mut editor, b"\x1b[A\x1b[A\n"), b"second");
    }

    #[test]
    fn history_wraps_modulo_depth() {
        let mut editor = LineEditor::new();
        assert_eq!(read(&mut editor, b"only\n"), b"only");

        // DEPTH presses of "previous" walk the whole ring (one filled
        // slot, the rest empty) back to the slot under edit.
        let mut script = std::vec::Vec::new();
        for _ in 0..HISTORY_DEPTH {
            script.extend_from_slice(b"\x1b[A");
        }
        script.push(b'\n');
        assert!(read(&mut editor, &script).is_empty());

        // One step beyond a full revolution lands on "only" again.
        let mut script = std::vec::Vec::new();
        for _ in 0..HISTORY_DEPTH + 1 {
            script.extend_from_slice(b"\x1b[A");
        }
        script.push(b'\n');
        assert_eq!(read(&mut editor, &script), b"only");
    }

    #[test]
    fn editing_a_recalled_line_rewrites_history() {
        let mut editor = LineEditor::new();
        assert_eq!(read(&mut editor, b"halt\n"), b"halt");
        // Recall "halt", append "x", submit: the slot now holds "haltx"
        // and the original text is gone.
        assert_eq!(read(&mut editor, b"\x1b[Ax\n"), b"haltx");
        assert_eq!(read(&mut editor, b"\x1b[A\n"), b"haltx");
    }

    #[test]
    fn unique_completion_appends_separator() {
        let registry = CommandRegistry::new();
        assert!(registry.register(nop_desc("btrace", "stack trace")));
        assert!(registry.register(nop_desc("halt", "stop")));

        let mut editor = LineEditor::new();
        let (line, _) = read_with(&mut editor, b"bt\t\n", &registry, None);
        assert_eq!(line, b"btrace ");
    }

    #[test]
    fn unique_completion_mid_line_adds_no_separator() {
        let registry = CommandRegistry::new();
        assert!(registry.register(nop_desc("btrace", "stack trace")));

        let mut editor = LineEditor::new();
        // Word is completed from its middle; the caret ends at the word
        // end, which is not the line end, so no space is added.
        let (line, _) = read_with(&mut editor, b"bt x\x1b[H\x1b[C\x1b[C\t\n", &registry, None);
        assert_eq!(line, b"btrace x");
    }

    #[test]
    fn ambiguous_completion_leaves_line_unmodified() {
        let registry = CommandRegistry::new();
        assert!(registry.register(nop_desc("tasks", "list tasks")));
        assert!(registry.register(nop_desc("tlb", "flush tlb")));

        let mut editor = LineEditor::new();
        let (line, echoed) = read_with(&mut editor, b"t\t\n", &registry, None);
        assert_eq!(line, b"t");
        let echoed = core::str::from_utf8(&echoed).unwrap();
        assert!(echoed.contains("tasks - list tasks"));
        assert!(echoed.contains("tlb - flush tlb"));
        // The prompt is printed again after the listing.
        assert!(echoed.matches("kcon> ").count() >= 2);
    }

    #[test]
    fn ambiguous_completion_inserts_common_extension() {
        let registry = CommandRegistry::new();
        assert!(registry.register(nop_desc("threads", "")));
        assert!(registry.register(nop_desc("threadkill", "")));

        let mut editor = LineEditor::new();
        let (line, _) = read_with(&mut editor, b"th\t\n", &registry, None);
        assert_eq!(line, b"thread");
    }

    #[test]
    fn later_words_complete_against_symbols() {
        let registry = CommandRegistry::new();
        assert!(registry.register(nop_desc("call", "call a symbol")));
        let table = TestSymtab::new(&[("sched_init", 0x1000)]);

        let mut editor = LineEditor::new();
        let (line, _) = read_with(&mut editor, b"call &sched\t\n", &registry, Some(&table));
        assert_eq!(line, b"call &sched_init ");
    }

    #[test]
    fn line_buffer_invariants() {
        let mut buf = LineBuffer::new();
        assert!(buf.insert_at(0, b'b'));
        assert!(buf.insert_at(0, b'a'));
        assert!(buf.insert_at(2, b'c'));
        assert_eq!(buf.as_bytes(), b"abc");
        buf.remove_at(1);
        assert_eq!(buf.as_bytes(), b"ac");
        buf.clear();
        assert!(buf.is_empty());

        for i in 0..MAX_CMDLINE {
            assert!(buf.insert_at(i, b'x'));
        }
        assert!(!buf.insert_at(0, b'y'));
        assert_eq!(buf.len(), MAX_CMDLINE);
    }
}
