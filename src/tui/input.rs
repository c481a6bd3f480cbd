//! Input handling and keybindings.
//!
//! Keys resolve through static tables keyed by mode: the mode's own table
//! first, then the bindings shared by browsing and navigation.
//! Confirmation and help consume every key themselves.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::provider::SnapshotSource;
use crate::view::{SortKey, View};

use super::navigable::NavigableTable;
use super::state::{AppState, ControlAction, Mode};

/// Result of handling a key event.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// No action, continue.
    None,
    /// Quit the application.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Movement {
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    ShowView(View),
    Sort(SortKey),
    CycleDurationMode,
    CycleQueryDisplay,
    Slower,
    Faster,
    TogglePause,
    Refresh,
    RefreshSize,
    ToggleSystem,
    ToggleInstance,
    ToggleProcess,
    Move(Movement),
    Tag,
    Request(ControlAction),
    Leave,
}

impl Command {
    fn describe(self) -> &'static str {
        match self {
            Command::Quit => "quit",
            Command::Help => "this help",
            Command::ShowView(View::Running) => "running queries",
            Command::ShowView(View::Waiting) => "waiting queries",
            Command::ShowView(View::Blocking) => "blocking queries",
            Command::Sort(SortKey::Cpu) => "sort by CPU%",
            Command::Sort(SortKey::Mem) => "sort by MEM%",
            Command::Sort(SortKey::Read) => "sort by READ/s",
            Command::Sort(SortKey::Write) => "sort by WRITE/s",
            Command::Sort(SortKey::Time) => "sort by TIME+",
            Command::Sort(SortKey::Duration) => "sort by DURATION",
            Command::CycleDurationMode => "duration mode: query, transaction, backend",
            Command::CycleQueryDisplay => "query display: full, truncated, indented",
            Command::Slower => "increase refresh interval",
            Command::Faster => "decrease refresh interval",
            Command::TogglePause => "pause / resume refresh",
            Command::Refresh => "refresh now",
            Command::RefreshSize => "recompute database size",
            Command::ToggleSystem => "toggle system info",
            Command::ToggleInstance => "toggle instance info",
            Command::ToggleProcess => "toggle process info",
            Command::Move(_) => "select row (enters navigation)",
            Command::Tag => "tag / untag row",
            Command::Request(ControlAction::Cancel) => "cancel query",
            Command::Request(ControlAction::Terminate) => "terminate backend",
            Command::Leave => "untag all and leave navigation",
        }
    }
}

type Bindings = &'static [(KeyCode, Command)];

/// Bindings shared by browsing and navigation.
const COMMON_KEYS: Bindings = &[
    (KeyCode::F(1), Command::ShowView(View::Running)),
    (KeyCode::Char('1'), Command::ShowView(View::Running)),
    (KeyCode::F(2), Command::ShowView(View::Waiting)),
    (KeyCode::Char('2'), Command::ShowView(View::Waiting)),
    (KeyCode::F(3), Command::ShowView(View::Blocking)),
    (KeyCode::Char('3'), Command::ShowView(View::Blocking)),
    (KeyCode::Char('c'), Command::Sort(SortKey::Cpu)),
    (KeyCode::Char('m'), Command::Sort(SortKey::Mem)),
    (KeyCode::Char('r'), Command::Sort(SortKey::Read)),
    (KeyCode::Char('w'), Command::Sort(SortKey::Write)),
    (KeyCode::Char('t'), Command::Sort(SortKey::Time)),
    (KeyCode::Char('d'), Command::Sort(SortKey::Duration)),
    (KeyCode::Char('T'), Command::CycleDurationMode),
    (KeyCode::Char('v'), Command::CycleQueryDisplay),
    (KeyCode::Char('+'), Command::Slower),
    (KeyCode::Char('-'), Command::Faster),
    (KeyCode::Char('R'), Command::Refresh),
    (KeyCode::Char('D'), Command::RefreshSize),
    (KeyCode::Char('s'), Command::ToggleSystem),
    (KeyCode::Char('i'), Command::ToggleInstance),
    (KeyCode::Char('o'), Command::ToggleProcess),
    (KeyCode::Up, Command::Move(Movement::Up)),
    (KeyCode::Char('k'), Command::Move(Movement::Up)),
    (KeyCode::Down, Command::Move(Movement::Down)),
    (KeyCode::Char('j'), Command::Move(Movement::Down)),
    (KeyCode::PageUp, Command::Move(Movement::PageUp)),
    (KeyCode::PageDown, Command::Move(Movement::PageDown)),
    (KeyCode::Home, Command::Move(Movement::Home)),
    (KeyCode::End, Command::Move(Movement::End)),
    (KeyCode::Char('h'), Command::Help),
    (KeyCode::Char('q'), Command::Quit),
];

const BROWSING_KEYS: Bindings = &[(KeyCode::Char(' '), Command::TogglePause)];

const NAVIGATION_KEYS: Bindings = &[
    (KeyCode::Char(' '), Command::Tag),
    (KeyCode::Char('C'), Command::Request(ControlAction::Cancel)),
    (KeyCode::Char('K'), Command::Request(ControlAction::Terminate)),
    (KeyCode::Esc, Command::Leave),
];

fn lookup(mode: &Mode, code: KeyCode) -> Option<Command> {
    let own = match mode {
        Mode::Browsing => BROWSING_KEYS,
        Mode::Navigation => NAVIGATION_KEYS,
        Mode::Confirmation { .. } | Mode::Help { .. } => return None,
    };
    own.iter()
        .chain(COMMON_KEYS)
        .find(|(key, _)| *key == code)
        .map(|(_, command)| *command)
}

fn key_label(code: KeyCode) -> String {
    match code {
        KeyCode::F(n) => format!("F{}", n),
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::PageUp => "PgUp".to_string(),
        KeyCode::PageDown => "PgDn".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        other => format!("{:?}", other),
    }
}

/// Help lines per section: keys bound to the same command are joined.
pub fn help_entries() -> Vec<(&'static str, Vec<(String, &'static str)>)> {
    let group = |bindings: Bindings| {
        let mut entries: Vec<(String, &'static str)> = Vec::new();
        let mut last: Option<Command> = None;
        for (key, command) in bindings {
            let same = last.is_some_and(|l| {
                l == *command || matches!((l, command), (Command::Move(_), Command::Move(_)))
            });
            match entries.last_mut() {
                Some((keys, _)) if same => {
                    keys.push_str(", ");
                    keys.push_str(&key_label(*key));
                }
                _ => entries.push((key_label(*key), command.describe())),
            }
            last = Some(*command);
        }
        entries
    };
    vec![
        ("Dashboard", group(COMMON_KEYS)),
        ("Browsing", group(BROWSING_KEYS)),
        ("Navigation", group(NAVIGATION_KEYS)),
    ]
}

/// Handles key input and updates state.
pub fn handle_key(
    state: &mut AppState,
    source: &mut dyn SnapshotSource,
    key: KeyEvent,
) -> KeyAction {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyAction::Quit;
    }
    state.status_message = None;

    match std::mem::take(&mut state.mode) {
        Mode::Confirmation { action, pids } => {
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                state.run_action(source, action, &pids);
            } else {
                state.status_message = Some(format!("{} aborted", action.verb()));
            }
            return KeyAction::None;
        }
        Mode::Help { from_navigation } => {
            if from_navigation {
                state.mode = Mode::Navigation;
            }
            return KeyAction::None;
        }
        mode => state.mode = mode,
    }

    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return KeyAction::None;
    }
    match lookup(&state.mode, key.code) {
        Some(command) => execute(state, command),
        None => KeyAction::None,
    }
}

fn execute(state: &mut AppState, command: Command) -> KeyAction {
    match command {
        Command::Quit => return KeyAction::Quit,
        Command::Help => {
            state.mode = Mode::Help {
                from_navigation: state.mode.is_navigation(),
            }
        }
        Command::ShowView(view) => state.set_view(view),
        Command::Sort(key) => {
            state.view.sort_key = key;
            state.resolve_cursor();
        }
        Command::CycleDurationMode => {
            state.view.duration_mode = state.view.duration_mode.next();
            state.scheduler.request_refresh();
        }
        Command::CycleQueryDisplay => {
            state.view.query_display = state.view.query_display.next();
        }
        Command::Slower | Command::Faster => {
            if command == Command::Slower {
                state.scheduler.slower();
            } else {
                state.scheduler.faster();
            }
            state.status_message = Some(format!(
                "refresh interval: {}s",
                state.scheduler.interval_secs()
            ));
        }
        Command::TogglePause => {
            state.scheduler.toggle_pause();
        }
        Command::Refresh => state.scheduler.request_refresh(),
        Command::RefreshSize => state.scheduler.request_size_refresh(),
        Command::ToggleSystem => state.header.system = !state.header.system,
        Command::ToggleInstance => state.header.instance = !state.header.instance,
        Command::ToggleProcess => state.header.process = !state.header.process,
        Command::Move(movement) => {
            if !state.mode.is_navigation() {
                state.mode = Mode::Navigation;
                state.resolve_cursor();
            }
            let table = &mut state.table;
            match movement {
                Movement::Up => table.select_up(),
                Movement::Down => table.select_down(),
                Movement::PageUp => table.page_up(),
                Movement::PageDown => table.page_down(),
                Movement::Home => table.home(),
                Movement::End => table.end(),
            }
            state.resolve_cursor();
        }
        Command::Tag => {
            if let Some(pid) = state.focused_pid() {
                state.selection.toggle(pid);
                state.table.select_down();
                state.resolve_cursor();
            }
        }
        Command::Request(action) => {
            let pids = state.action_targets();
            if pids.is_empty() {
                state.status_message = Some("no backend selected".to_string());
            } else {
                state.mode = Mode::Confirmation { action, pids };
            }
        }
        Command::Leave => {
            state.selection.clear();
            state.mode = Mode::Browsing;
        }
    }
    KeyAction::None
}
