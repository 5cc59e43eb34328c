//! Terminal device.
//!
//! Input is polled without blocking, at most one byte per tick, staged
//! until the program reads it; output is synchronous and unbuffered.
//! The transport behind the device is the [`Console`] seam: a
//! crossterm-backed stdio console for real runs and a scripted console
//! for tests and headless use.

use crate::dev::{Device, STATUS_IRQ_PENDING, STATUS_READY};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

/// Byte transport the terminal device talks to.
pub trait Console {
    /// At most one pending input byte, without blocking.
    fn poll_byte(&mut self) -> Option<u8>;

    /// Emit one byte immediately.
    fn write_byte(&mut self, byte: u8);
}

/// Crossterm-backed console on the process stdio.
///
/// Raw mode is enabled for the guard's lifetime so single keystrokes
/// arrive without waiting for Enter.
pub struct StdioConsole {
    _raw: (),
}

impl StdioConsole {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { _raw: () })
    }
}

impl Drop for StdioConsole {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl Console for StdioConsole {
    fn poll_byte(&mut self) -> Option<u8> {
        // Zero timeout: no input just means None this tick
        if !event::poll(Duration::ZERO).unwrap_or(false) {
            return None;
        }
        match event::read() {
            Ok(Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            })) => match code {
                KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
                KeyCode::Enter => Some(b'\n'),
                KeyCode::Tab => Some(b'\t'),
                KeyCode::Backspace => Some(0x08),
                KeyCode::Esc => Some(0x1b),
                _ => None,
            },
            _ => None,
        }
    }

    fn write_byte(&mut self, byte: u8) {
        let mut out = io::stdout();
        // Raw mode needs the explicit carriage return
        let result = if byte == b'\n' {
            out.write_all(b"\r\n")
        } else {
            out.write_all(&[byte])
        };
        let _ = result.and_then(|_| out.flush());
    }
}

/// Deterministic console for tests and headless runs: input comes from
/// a queue, output lands in a buffer. Clones share the same buffers, so
/// a test can keep one handle while the device owns another.
#[derive(Clone, Default)]
pub struct ScriptedConsole {
    inner: Rc<RefCell<Script>>,
}

#[derive(Default)]
struct Script {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the device to poll.
    pub fn push_input(&self, bytes: &[u8]) {
        self.inner.borrow_mut().input.extend(bytes.iter().copied());
    }

    /// Everything the device has written so far.
    pub fn output(&self) -> Vec<u8> {
        self.inner.borrow().output.clone()
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output()).into_owned()
    }
}

impl Console for ScriptedConsole {
    fn poll_byte(&mut self) -> Option<u8> {
        self.inner.borrow_mut().input.pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.inner.borrow_mut().output.push(byte);
    }
}

/// The terminal device: one-byte input staging with optional echo.
pub struct Terminal<C: Console> {
    console: C,
    staged: Option<u8>,
    echo: bool,
    armed: bool,
    status: u8,
    vector: usize,
}

impl<C: Console> Terminal<C> {
    /// A closed terminal on the given transport and IRQ vector, echo on.
    pub fn new(console: C, vector: usize) -> Self {
        Self {
            console,
            staged: None,
            echo: true,
            armed: false,
            status: STATUS_READY,
            vector,
        }
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }
}

impl<C: Console> Device for Terminal<C> {
    fn kind(&self) -> &'static str {
        "terminal"
    }

    fn open(&mut self, mode: i32) -> bool {
        // Modes 0 and 2 are input-capable and reset the staging buffer;
        // opening in any mode arms the device
        if mode == 0 || mode == 2 {
            self.staged = None;
        }
        self.armed = true;
        self.status = STATUS_READY;
        true
    }

    fn close(&mut self) -> bool {
        self.armed = false;
        self.status = STATUS_READY;
        true
    }

    fn read(&mut self) -> Option<i32> {
        let byte = self.staged.take()?;
        self.status &= !STATUS_IRQ_PENDING;
        Some(i32::from(byte))
    }

    fn write(&mut self, value: i32) -> bool {
        if (0..=255).contains(&value) {
            self.console.write_byte(value as u8);
        } else {
            // Out-of-byte-range values fall back to a bracketed number
            for b in format!("[{}]", value).bytes() {
                self.console.write_byte(b);
            }
        }
        true
    }

    fn tick(&mut self) {
        if !self.armed || self.staged.is_some() {
            return;
        }
        if let Some(byte) = self.console.poll_byte() {
            self.staged = Some(byte);
            if self.echo {
                self.console.write_byte(byte);
            }
            self.status |= STATUS_IRQ_PENDING;
        }
    }

    fn status(&self) -> u8 {
        self.status
    }

    fn irq_vector(&self) -> usize {
        self.vector
    }

    fn irq_enabled(&self) -> bool {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_terminal(script: &ScriptedConsole) -> Terminal<ScriptedConsole> {
        let mut term = Terminal::new(script.clone(), 1);
        term.open(2);
        term
    }

    #[test]
    fn test_tick_stages_one_byte_and_raises_irq() {
        let script = ScriptedConsole::new();
        script.push_input(b"hi");
        let mut term = open_terminal(&script);

        term.tick();
        assert_ne!(term.status() & STATUS_IRQ_PENDING, 0);
        // Echo happened immediately
        assert_eq!(script.output(), b"h");

        assert_eq!(term.read(), Some(i32::from(b'h')));
        assert_eq!(term.status() & STATUS_IRQ_PENDING, 0);

        term.tick();
        assert_eq!(term.read(), Some(i32::from(b'i')));
    }

    #[test]
    fn test_staged_byte_blocks_further_polling() {
        let script = ScriptedConsole::new();
        script.push_input(b"ab");
        let mut term = open_terminal(&script);

        term.tick();
        term.tick();
        term.tick();

        // 'b' stayed queued in the transport while 'a' was staged
        assert_eq!(term.read(), Some(i32::from(b'a')));
        assert_eq!(term.read(), None);
    }

    #[test]
    fn test_closed_terminal_does_not_poll() {
        let script = ScriptedConsole::new();
        script.push_input(b"x");
        let mut term = Terminal::new(script.clone(), 1);

        term.tick();
        assert_eq!(term.read(), None);
        assert!(!term.irq_enabled());

        term.open(0);
        term.tick();
        assert_eq!(term.read(), Some(i32::from(b'x')));
    }

    #[test]
    fn test_write_byte_and_bracketed_fallback() {
        let script = ScriptedConsole::new();
        let mut term = open_terminal(&script);

        assert!(term.write(65));
        assert!(term.write(300));
        assert!(term.write(-4));
        assert_eq!(script.output_string(), "A[300][-4]");
    }

    #[test]
    fn test_echo_can_be_disabled() {
        let script = ScriptedConsole::new();
        script.push_input(b"q");
        let mut term = open_terminal(&script);
        term.set_echo(false);

        term.tick();
        assert_eq!(term.read(), Some(i32::from(b'q')));
        assert!(script.output().is_empty());
    }

    #[test]
    fn test_reopen_for_input_clears_stale_byte() {
        let script = ScriptedConsole::new();
        script.push_input(b"old");
        let mut term = open_terminal(&script);

        term.tick();
        term.open(0);
        assert_eq!(term.read(), None);
    }
}
