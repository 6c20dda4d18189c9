//! # Line Classifier
//!
//! Turns a raw server log line into a [`ServerEvent`].
//!
//! Only lines inside the `[Server thread/INFO]:` envelope are considered. The
//! inner message is tested against the patterns below in order and the first
//! hit wins; chat must stay ahead of emote so `<Ann> * waves` stays chat.

use regex::Regex;
use std::sync::LazyLock;

use super::deaths;
use crate::domain::types::ServerEvent;

/// Player name grammar shared by every pattern.
pub(crate) const NAME: &str = "[a-zA-Z0-9_]+";

static ENVELOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Server thread/INFO\]: (.*)").expect("valid envelope"));

static CHAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^<({NAME})> (.*)$")).expect("valid chat pattern"));
static JOIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^({NAME}) joined the game$")).expect("valid join pattern"));
static LEAVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^({NAME}) left the game$")).expect("valid leave pattern"));
static ADVANCEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({NAME}) has made the advancement \[(.*)\]$"))
        .expect("valid advancement pattern")
});
static CHALLENGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({NAME}) has completed the challenge \[(.*)\]$"))
        .expect("valid challenge pattern")
});
static EMOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\* ({NAME}) (.*)$")).expect("valid emote pattern"));

/// Classifies one line of server output. Never fails.
pub fn classify(line: &str) -> ServerEvent {
    let Some(inner) = ENVELOPE.captures(line).and_then(|c| c.get(1)) else {
        return unrecognized(line);
    };
    let inner = inner.as_str().trim();

    if let Some(c) = CHAT.captures(inner) {
        return ServerEvent::Chat {
            user: c[1].to_string(),
            text: c[2].to_string(),
        };
    }
    if let Some(c) = JOIN.captures(inner) {
        return ServerEvent::Join {
            user: c[1].to_string(),
        };
    }
    if let Some(c) = LEAVE.captures(inner) {
        return ServerEvent::Leave {
            user: c[1].to_string(),
        };
    }
    if let Some(c) = ADVANCEMENT.captures(inner) {
        return ServerEvent::Advancement {
            user: c[1].to_string(),
            name: c[2].to_string(),
        };
    }
    if let Some(c) = CHALLENGE.captures(inner) {
        return ServerEvent::Challenge {
            user: c[1].to_string(),
            name: c[2].to_string(),
        };
    }
    if let Some(c) = EMOTE.captures(inner) {
        return ServerEvent::Emote {
            user: c[1].to_string(),
            action: c[2].to_string(),
        };
    }
    if let Some((_, user, cause)) = deaths::match_death(inner) {
        return ServerEvent::Death { user, cause };
    }

    unrecognized(line)
}

fn unrecognized(line: &str) -> ServerEvent {
    ServerEvent::Unrecognized {
        raw: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(inner: &str) -> String {
        format!("[22:22:34] [Server thread/INFO]: {inner}")
    }

    #[test]
    fn test_chat() {
        assert_eq!(
            classify("[22:22:34] [Server thread/INFO]: <Ann> hi"),
            ServerEvent::Chat {
                user: "Ann".into(),
                text: "hi".into()
            }
        );
    }

    #[test]
    fn test_chat_keeps_embedded_brackets() {
        assert_eq!(
            classify(&info("<Ann> <troll> hey :) <yo>")),
            ServerEvent::Chat {
                user: "Ann".into(),
                text: "<troll> hey :) <yo>".into()
            }
        );
    }

    #[test]
    fn test_chat_wins_over_emote() {
        assert_eq!(
            classify(&info("<Ann> * Bob waves")),
            ServerEvent::Chat {
                user: "Ann".into(),
                text: "* Bob waves".into()
            }
        );
    }

    #[test]
    fn test_join_and_leave() {
        assert_eq!(
            classify("[23:04:20] [Server thread/INFO]: Ann joined the game"),
            ServerEvent::Join { user: "Ann".into() }
        );
        assert_eq!(
            classify("[23:04:30] [Server thread/INFO]: Ann left the game"),
            ServerEvent::Leave { user: "Ann".into() }
        );
    }

    #[test]
    fn test_advancement_and_challenge() {
        assert_eq!(
            classify("[23:14:58] [Server thread/INFO]: Ann has made the advancement [First Steps]"),
            ServerEvent::Advancement {
                user: "Ann".into(),
                name: "First Steps".into()
            }
        );
        assert_eq!(
            classify(&info("Ann has made the advancement [Ol' Betsy]")),
            ServerEvent::Advancement {
                user: "Ann".into(),
                name: "Ol' Betsy".into()
            }
        );
        assert_eq!(
            classify(&info("Ann_2 has completed the challenge [How Did We Get Here?]")),
            ServerEvent::Challenge {
                user: "Ann_2".into(),
                name: "How Did We Get Here?".into()
            }
        );
    }

    #[test]
    fn test_emote() {
        assert_eq!(
            classify("[23:19:42] [Server thread/INFO]: * Ann says stuff"),
            ServerEvent::Emote {
                user: "Ann".into(),
                action: "says stuff".into()
            }
        );
    }

    #[test]
    fn test_deaths() {
        assert_eq!(
            classify("[23:22:56] [Server thread/INFO]: Ann fell out of the world"),
            ServerEvent::Death {
                user: "Ann".into(),
                cause: "fell out of the world".into()
            }
        );
        assert_eq!(
            classify("[00:02:29] [Server thread/INFO]: Ann was slain by Zombie using [Justice4all]"),
            ServerEvent::Death {
                user: "Ann".into(),
                cause: "was slain by Zombie using [Justice4all]".into()
            }
        );
    }

    #[test]
    fn test_outside_envelope() {
        let line = "[22:22:34] [Server thread/WARN]: <Ann> hi";
        assert_eq!(
            classify(line),
            ServerEvent::Unrecognized { raw: line.into() }
        );
    }

    #[test]
    fn test_unknown_inner_message() {
        let line = info("Done (3.2s)! For help, type \"help\"");
        assert_eq!(
            classify(&line),
            ServerEvent::Unrecognized { raw: line.clone() }
        );
    }

    #[test]
    fn test_trailing_newline_and_frame_residue() {
        assert_eq!(
            classify("\u{1}\0\0\0\0\0\0\u{30}[10:00:00] [Server thread/INFO]: Ann joined the game\r\n"),
            ServerEvent::Join { user: "Ann".into() }
        );
    }

    #[test]
    fn test_total_on_odd_input() {
        for line in ["", "\n", "[Server thread/INFO]: ", "\u{0}\u{1}", "[Server thread/INFO]: <> x"] {
            let _ = classify(line);
        }
    }
}
