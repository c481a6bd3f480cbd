//! Widgets for TUI rendering.

mod activity;
mod confirm;
mod footer;
mod header;
mod help;

pub use activity::render_activity;
pub use confirm::render_confirm;
pub use footer::{FOOTER_HEIGHT, render_footer};
pub use header::{header_lines, render_header};
pub use help::render_help;
