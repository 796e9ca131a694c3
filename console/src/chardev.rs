//! Character device seams.
//!
//! The console does not own a UART or keyboard driver; the embedding
//! kernel hands it one object per direction. Input is a blocking
//! single-byte fetch plus a readiness poll; output is a single-byte
//! write with convenience helpers layered on top.

use core::fmt;

/// Blocking byte source (serial receiver, keyboard queue, ...).
pub trait InputDevice: Sync {
    /// Fetch the next input byte, blocking until one is available.
    fn getc(&self) -> u8;

    /// True when a byte is already waiting.
    fn poll_ready(&self) -> bool;
}

/// Byte sink used for echoing, prompts and messages.
pub trait OutputDevice: Sync {
    fn putchar(&self, byte: u8);

    fn put_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            self.putchar(b);
        }
    }

    fn put_str(&self, text: &str) {
        self.put_bytes(text.as_bytes());
    }
}

/// Adapter so formatted messages can be written straight to an
/// [`OutputDevice`] with `write!`.
pub struct Writer<'a>(pub &'a dyn OutputDevice);

impl fmt::Write for Writer<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.put_str(s);
        Ok(())
    }
}
