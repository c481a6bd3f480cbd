//! pgtop - live terminal dashboard for database server sessions.
//!
//! The library holds everything behind the `pgtop` binary:
//! - `capability` - server version tiers and their column substitutions
//! - `collector` - the monitoring connection and host process stats
//! - `rates` - per-backend and instance rates between snapshots
//! - `scheduler` - refresh timing, pause and reconnect backoff
//! - `view` - UI-agnostic filtering, sorting and table models
//! - `tui` - the interactive dashboard

pub mod capability;
pub mod collector;
pub mod config;
pub mod export;
pub mod fmt;
pub mod model;
pub mod provider;
pub mod rates;
pub mod scheduler;
pub mod tui;
pub mod view;
