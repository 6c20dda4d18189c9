//! # Log Messages
//!
//! Templates for operator-facing log output.

pub const STARTING: &str = "Starting minebridge...";
pub const CONFIG_READ_ERROR: &str = "Failed to read config file";
pub const CONFIG_PARSE_ERROR: &str = "Failed to parse config file";
pub const DEFAULT_INACTIVITY: &str =
    "Inactivity timeout unset or invalid, using the default of one hour";
pub const SYNC_LOOP_START: &str = "Starting sync loop...";
pub const SHUTDOWN: &str = "Shutting down...";

pub fn logged_in(user: &str) -> String {
    format!("Logged in as {user}")
}

pub fn container_found(label: &str, id: &str) -> String {
    format!("Found server container {id} (label {label})")
}

pub fn sync_loop_fail(err: &str) -> String {
    format!("Sync loop failed: {err}")
}

pub fn shutdown_fail(err: &str) -> String {
    format!("Unable to listen for shutdown signal: {err}")
}

pub fn bridge_stopped(err: &str) -> String {
    format!("Bridge stopped: {err}")
}
