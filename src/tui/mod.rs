//! Terminal user interface of the dashboard.
//!
//! One control loop interleaves refresh cycles and key input: the
//! [`state::AppState`] owns everything shown, [`input`] maps keys to state
//! changes through per-mode binding tables, and `render` draws the header,
//! the activity table, the footer and any popup.

mod app;
mod event;
pub mod input;
mod navigable;
mod render;
pub mod state;
mod style;
mod widgets;

pub use app::App;
pub use navigable::{NavigableTable, TableCursor};
pub use state::{AppState, ControlAction, Mode};
