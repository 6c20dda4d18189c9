//! # Help Text
//!
//! One-line descriptions shown next to each prefix by `!help`.

pub const HELP: &str = ": gives you the list of the commands";

pub const CLEAR_ROOM: &str = "<room-id>: remove all messages from a room";
pub const REBOOT: &str = ": reboot the server...!!!!";
pub const WHITELIST_ADD: &str = "<username>: adds a user to the whitelist";
pub const WHITELIST_REMOVE: &str = "<username>: removes a user from the whitelist";
pub const WHITELIST_LIST: &str = ": list whitelisted players";
pub const CONSOLE: &str = "<command>: run a raw console command. USE WITH CAUTION!";

pub const MARKER_ADD: &str =
    "<overworld|nether|end> <X Z> <name>: add a marker called <name> on given coordinates";
pub const MARKER_LIST: &str = ": list your markers";
pub const MARKER_REMOVE: &str = "<name>: remove the marker.";
