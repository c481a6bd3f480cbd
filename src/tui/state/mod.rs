//! Application state management.

mod app_state;
mod selection;

pub use app_state::*;
pub use selection::Selection;

/// Backend control action behind a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Cancel the running query.
    Cancel,
    /// Terminate the backend.
    Terminate,
}

impl ControlAction {
    pub fn verb(self) -> &'static str {
        match self {
            ControlAction::Cancel => "cancel",
            ControlAction::Terminate => "terminate",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            ControlAction::Cancel => "cancelled",
            ControlAction::Terminate => "terminated",
        }
    }
}

/// Dashboard mode. Every mode other than `Browsing` reverts to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Browsing,
    /// Cursor over the visible rows; tagging enabled.
    Navigation,
    /// Waiting for `y` before acting on `pids`.
    Confirmation { action: ControlAction, pids: Vec<i32> },
    /// Static help; any key returns to the prior mode.
    Help { from_navigation: bool },
}

impl Mode {
    pub fn is_navigation(&self) -> bool {
        matches!(self, Mode::Navigation)
    }
}
