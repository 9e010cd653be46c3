// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "access/allowlist.rs"]
pub mod access;

#[path = "claw/claw_service.rs"]
pub mod claw;

#[path = "config/app_config.rs"]
pub mod config;

#[path = "credentials/mod.rs"]
pub mod credentials;

#[path = "inbox/mod.rs"]
pub mod inbox;
