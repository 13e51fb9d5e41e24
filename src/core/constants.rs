//! Shared constants used across the application

/// Idle status sentinel. Shown as the resting status line and suppressed
/// from the status transcript to avoid log noise.
pub const STANDBY_STATUS: &str = "Standby";

/// Default upstream backend base URL (the AI backend the relay fronts).
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8000";

/// Default relay base URL the `say` client talks to.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000";

/// Default relay listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
