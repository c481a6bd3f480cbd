//! Event handling for TUI.
//!
//! Input is read on the refresh loop itself: the loop waits for a key at
//! most until the next scheduled fetch, so keys pressed during a fetch stay
//! buffered by the terminal and are applied once it completes.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// Keyboard input.
    Key(KeyEvent),
    /// Terminal resize.
    Resize,
}

/// Waits up to `timeout` for the next relevant terminal event.
pub fn poll(timeout: Duration) -> io::Result<Option<Event>> {
    if !event::poll(timeout)? {
        return Ok(None);
    }
    Ok(match event::read()? {
        CrosstermEvent::Key(key) if key.kind != KeyEventKind::Release => Some(Event::Key(key)),
        CrosstermEvent::Resize(..) => Some(Event::Resize),
        _ => None,
    })
}
