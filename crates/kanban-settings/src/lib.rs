//! # kanban-settings
//!
//! Configuration for the kanban hub server, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`KanbanSettings::default()`]
//! 2. **Settings file**: `--settings`, `KANBAN_SETTINGS`, or
//!    `~/.kanban/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PORT`, `JWT_SECRET`, `CLIENT_URL`, and the
//!    `KANBAN_*` overrides
//!
//! Settings are loaded once by the binary and passed down explicitly.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_file_layer, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;
