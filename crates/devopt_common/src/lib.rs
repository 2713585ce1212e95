//! Devopt Common - shared types for the developer environment optimizer
//!
//! Snapshot and session data types, editor settings persistence,
//! settings reconciliation and the text-generation client.

pub mod editor_settings;
pub mod llm_client;
pub mod paths;
pub mod reconciler;
pub mod types;

pub use editor_settings::{SettingsError, SettingsStore};
pub use reconciler::{Condition, DesiredEdit, EditTable, ListLengthAdvisory, ReconcileOutcome};
pub use types::*;
