//! Pure collision passes over a roster snapshot. Stateless with respect to
//! rooms beyond the timestamp passed in; the session applies the results.

use shared::{distance, Orb, Player, PLAYER_RADIUS, TAG_RANGE};
use std::collections::BTreeMap;

/// One tag emitted by [`tag_pass`]. The tagger's cooldown reset and any
/// score transfer are applied by the session, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub tagger_id: u32,
    pub tagged_id: u32,
}

/// Finds every tag for the current tick. For each unordered pair whose
/// centers are closer than two avatar radii, each side qualifies
/// independently when its own cooldown has elapsed, so one overlap can
/// yield two tags in the same tick.
///
/// Plain O(n²) pairwise scan; at four players per room that is at most
/// six distance checks.
pub fn tag_pass(players: &BTreeMap<u32, Player>, now_ms: u64) -> Vec<Tag> {
    let list: Vec<&Player> = players.values().collect();
    let mut tags = Vec::new();

    for i in 0..list.len() {
        for j in (i + 1)..list.len() {
            let a = list[i];
            let b = list[j];
            if distance(a.position, b.position) >= TAG_RANGE {
                continue;
            }
            if a.tag_ready(now_ms) {
                tags.push(Tag {
                    tagger_id: a.id,
                    tagged_id: b.id,
                });
            }
            if b.tag_ready(now_ms) {
                tags.push(Tag {
                    tagger_id: b.id,
                    tagged_id: a.id,
                });
            }
        }
    }

    tags
}

/// Awards each orb to the first player in roster iteration order within
/// collection range (avatar radius + orb radius). First-in-order wins the
/// tie, not the nearest player. Returns `(player_id, orb_id)` pairs.
pub fn orb_pass(players: &BTreeMap<u32, Player>, orbs: &[Orb]) -> Vec<(u32, u32)> {
    let mut collected = Vec::new();

    for orb in orbs {
        for player in players.values() {
            if distance(player.position, orb.position) <= PLAYER_RADIUS + orb.radius {
                collected.push((player.id, orb.id));
                break;
            }
        }
    }

    collected
}
