//! # Messages
//!
//! User-facing chat messages and the formats used to relay server events.

pub const AUTH_DENIED: &str = "🚫 **Authorization Denied**.";
pub const CONFIRM_DENIED: &str = "Ok, I won't do it.";
pub const CONFIRM_GAVE_UP: &str = "Gave up waiting for confirmation.";
pub const DONE: &str = "Done";
pub const NO_OUTPUT: &str = "(no output)";
pub const DEATH_REACTION: &str = "🇫";

pub fn channel_not_found(id: &str) -> String {
    format!("did not find channel {id}")
}

pub fn clear_room_question(name: &str, secs: u64) -> String {
    format!("Clean room {name} (you have {secs}s to react)?")
}

pub fn reboot_question(secs: u64) -> String {
    format!("Are you sure you want to reboot the server (you have {secs}s to react)?")
}

pub fn whitelist_question(action: &str, user: &str, secs: u64) -> String {
    format!("Whitelist {action} {user} (you have {secs}s to react)?")
}

pub fn console_question(command: &str) -> String {
    format!(
        "😱 wow you're using the console 😱 are you sure you want to execute `{command}`?"
    )
}

pub fn usage(prefix: &str, args: &str) -> String {
    format!("Usage: `{prefix} {args}`")
}

pub fn command_failed(err: &str) -> String {
    format!("Command Failed: {err}")
}

// Markers
pub const BAD_COORDINATES: &str = "hughhh... I guess something is wrong with your coordinate?";
pub const MARKER_ADD_FAILED: &str = "hughhh... i can't add the marker :/ Reach an admin!";
pub const MARKER_ADDED: &str = "Marker added!";
pub const NO_MARKERS: &str = "You have no markers!";
pub const MARKERS_HEADER: &str = "Here are your markers:";
pub const MARKER_REMOVE_FAILED: &str = "Unable to remove marker. Contact an admin";
pub const MARKER_REMOVED: &str = "Marker removed.";
pub const MARKERS_UNAVAILABLE: &str = "Unable to read the markers right now.";

pub fn too_many_markers(count: usize) -> String {
    format!("You already have {count} markers")
}

pub fn no_marker_named(name: &str) -> String {
    format!("You have no markers named {name}")
}

// Relay
pub fn relay_chat(user: &str, text: &str) -> String {
    format!("{user} » {text}")
}

pub fn relay_join(user: &str) -> String {
    format!("➡️ {user} joined")
}

pub fn relay_leave(user: &str) -> String {
    format!("⬅️ {user} left")
}

pub fn relay_advancement(user: &str, name: &str) -> String {
    format!("💪 {user} has made the advancement {name}")
}

pub fn relay_challenge(user: &str, name: &str) -> String {
    format!("💪 {user} has completed the challenge {name}")
}

pub fn relay_emote(user: &str, action: &str) -> String {
    format!("*\\* {user} {action}*")
}

pub fn relay_death(user: &str, cause: &str) -> String {
    format!("💀 {user} {cause}")
}

pub fn presence_topic(online: u32, host: &str) -> String {
    format!("{online} players online - IP: {host}")
}
