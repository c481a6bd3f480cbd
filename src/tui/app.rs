//! Main TUI application.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use tracing::info;

use crate::provider::SnapshotSource;

use super::event::{self, Event};
use super::input::{KeyAction, handle_key};
use super::render::render;
use super::state::AppState;

/// Longest wait for input, so an external shutdown request is noticed.
const MAX_INPUT_WAIT: Duration = Duration::from_millis(250);

/// Main TUI application.
pub struct App<S: SnapshotSource> {
    source: S,
    state: AppState,
    shutdown: Arc<AtomicBool>,
}

impl<S: SnapshotSource> App<S> {
    /// `source` must already be connected; `shutdown` is set by the signal
    /// handler.
    pub fn new(source: S, mut state: AppState, shutdown: Arc<AtomicBool>) -> Self {
        state.connected(&source);
        Self {
            source,
            state,
            shutdown,
        }
    }

    /// Runs the dashboard until quit, restoring the terminal afterwards.
    pub fn run(mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested");
                return Ok(());
            }

            // A started fetch always completes before the next check.
            self.state.tick(&mut self.source, Instant::now());
            terminal.draw(|frame| render(frame, &mut self.state))?;

            let timeout = self
                .state
                .scheduler
                .next_wakeup(Instant::now())
                .min(MAX_INPUT_WAIT);
            match event::poll(timeout)? {
                Some(Event::Key(key)) => {
                    if handle_key(&mut self.state, &mut self.source, key) == KeyAction::Quit {
                        info!("quit");
                        return Ok(());
                    }
                }
                Some(Event::Resize) | None => {}
            }
        }
    }
}
