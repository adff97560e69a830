//! Hashtag anchors for a team pair.

use crate::schedule::Game;

/// Hashtags queried for a pair of team codes.
///
/// Both authoring orders are produced (`#AvsB`, `#BvsA`) since there is no
/// convention for which team is named first. Codes are used verbatim:
/// matching against the post store is case-sensitive.
pub fn anchors(a: &str, b: &str) -> Vec<String> {
    let forward = format!("#{a}vs{b}");
    let reverse = format!("#{b}vs{a}");
    if forward == reverse {
        vec![forward]
    } else {
        vec![forward, reverse]
    }
}

/// Anchors for a scheduled game (away team first).
pub fn game_anchors(game: &Game) -> Vec<String> {
    anchors(&game.away_team, &game.home_team)
}
