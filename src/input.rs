use std::{io, time::Duration};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tracing::warn;

/// What a pending key (or terminal event) asks the refresh loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Quit,
    Interrupt,
    Refresh,
}

pub trait Keyboard {
    /// Waits at most `timeout` for one event; `None` when nothing arrived.
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<Input>>;
}

pub struct TerminalKeyboard;

impl Keyboard for TerminalKeyboard {
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<Input>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(classify(event::read()?))
    }
}

fn classify(event: Event) -> Option<Input> {
    match event {
        Event::Key(KeyEvent {
            code, modifiers, kind, ..
        }) if kind != KeyEventKind::Release => Some(match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Input::Interrupt,
            KeyCode::Char('q') | KeyCode::Char('Q') => Input::Quit,
            _ => Input::Refresh,
        }),
        Event::Resize(..) => Some(Input::Refresh),
        _ => None,
    }
}

/// Switches the terminal between its saved settings and raw, unechoed input.
pub trait LineDiscipline {
    fn enter_raw(&mut self) -> io::Result<()>;
    fn restore(&mut self) -> io::Result<()>;
}

pub struct TerminalDiscipline;

impl LineDiscipline for TerminalDiscipline {
    fn enter_raw(&mut self) -> io::Result<()> {
        enable_raw_mode()
    }

    fn restore(&mut self) -> io::Result<()> {
        disable_raw_mode()
    }
}

/// Holds raw mode for its lifetime and restores the terminal exactly once,
/// whether released explicitly, dropped on an early return, or unwound.
pub struct RawModeGuard<D: LineDiscipline> {
    discipline: D,
    active: bool,
}

impl<D: LineDiscipline> RawModeGuard<D> {
    pub fn acquire(mut discipline: D) -> io::Result<Self> {
        discipline.enter_raw()?;
        Ok(Self {
            discipline,
            active: true,
        })
    }

    pub fn release(&mut self) -> io::Result<()> {
        if !std::mem::replace(&mut self.active, false) {
            return Ok(());
        }
        self.discipline.restore()
    }
}

impl<D: LineDiscipline> Drop for RawModeGuard<D> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(%err, "failed to restore terminal settings");
        }
    }
}
