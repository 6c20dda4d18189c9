//! Death message templates.
//!
//! Vanilla death messages are `<player> <cause>` where the cause starts with a
//! fixed phrase. Templates are tried in order and the first match wins, so
//! specific phrases sit above the generic ones they overlap with.

use regex::Regex;
use std::sync::LazyLock;

use super::classifier::NAME;

/// Cause phrases, most specific first.
const CAUSES: &[&str] = &[
    // projectiles
    r"was shot by a skull from .+",
    r"was shot by .+ using .+",
    r"was shot by .+",
    r"was pummeled by .+",
    r"was fireballed by .+",
    r"was shot off some vines by .+",
    r"was shot off a ladder by .+",
    // falling
    r"hit the ground too hard.*",
    r"fell from a high place.*",
    r"fell off a ladder",
    r"fell off some (?:twisting |weeping )?vines",
    r"fell off scaffolding",
    r"fell while climbing",
    r"fell out of the water",
    r"fell into a patch of (?:fire|cacti)",
    r"was doomed to fall.*",
    r"was blown from a high place by .+",
    r"was squashed by a falling (?:anvil|block).*",
    r"was skewered by a falling stalactite.*",
    r"was impaled on a stalagmite.*",
    r"experienced kinetic energy.*",
    // fire and lava
    r"went up in flames",
    r"walked into fire whilst fighting .+",
    r"burned to death",
    r"was burnt to a crisp whilst fighting .+",
    r"tried to swim in lava.*",
    r"discovered the floor was lava",
    r"walked into danger zone due to .+",
    // explosions
    r"blew up",
    r"was blown up by .+",
    r"went off with a bang.*",
    r"was killed by \[Intentional Game Design\]",
    // environment
    r"drowned.*",
    r"suffocated in a wall.*",
    r"was squished too much",
    r"was squashed by .+",
    r"was pricked to death",
    r"walked into a cactus whilst trying to escape .+",
    r"was poked to death by a sweet berry bush.*",
    r"was struck by lightning.*",
    r"froze to death",
    r"was frozen to death by .+",
    r"starved to death.*",
    r"withered away.*",
    r"was roasted in dragon breath.*",
    r"was obliterated by a sonically-charged shriek.*",
    // mobs and players
    r"was slain by .+",
    r"was stung to death.*",
    r"was stomped by .+",
    r"was impaled by .+",
    r"was killed by magic.*",
    r"was killed by .+ using magic",
    r"was killed trying to hurt .+",
    r"was killed by .+",
    // void
    r"fell out of the world",
    r"didn't want to live in the same world as .+",
    r"left the confines of this world.*",
    // fallback
    r"died because of .+",
    r"died",
];

pub(crate) static TEMPLATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CAUSES
        .iter()
        .map(|cause| Regex::new(&format!("^({NAME}) ({cause})$")).expect("valid death template"))
        .collect()
});

/// Matches `inner` against the templates.
/// Returns the template position with the captured player and cause.
pub fn match_death(inner: &str) -> Option<(usize, String, String)> {
    TEMPLATES.iter().enumerate().find_map(|(i, re)| {
        let caps = re.captures(inner)?;
        Some((i, caps[1].to_string(), caps[2].to_string()))
    })
}
