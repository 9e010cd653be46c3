// Discord layer - commands, the allowlist gate, and presence.

#[path = "access/allowlist_check.rs"]
pub mod access;

#[path = "commands/command_catalog.rs"]
pub mod commands;

// Re-export command types for convenience
pub use commands::{Context, Data, Error};
