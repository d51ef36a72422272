//! Snapshot buffering and interpolation for smooth remote entity rendering.
//!
//! The server broadcasts authoritative state at its tick rate, which is
//! lower and less regular than the client's render rate. Rendering raw
//! snapshots directly makes movement stutter. Instead the client renders
//! slightly in the past, blending between the two buffered snapshots that
//! bracket the render time.

use shared::{lerp, Orb, Player};
use std::collections::VecDeque;

/// How many snapshots to retain before discarding the oldest
pub const BUFFER_SIZE: usize = 20;

/// How far behind the newest snapshot the client renders, in milliseconds
pub const INTERPOLATION_DELAY_MS: u64 = 50;

/// A timestamped copy of the authoritative room state
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub time_ms: u64,
    pub players: Vec<Player>,
    pub orbs: Vec<Orb>,
}

/// Ring of recent server snapshots, sampled at render time
#[derive(Debug, Default)]
pub struct InterpolationBuffer {
    snapshots: VecDeque<Snapshot>,
}

impl InterpolationBuffer {
    pub fn new() -> Self {
        InterpolationBuffer {
            snapshots: VecDeque::with_capacity(BUFFER_SIZE),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn newest_time(&self) -> Option<u64> {
        self.snapshots.back().map(|s| s.time_ms)
    }

    /// Appends a snapshot, evicting the oldest once the buffer is full.
    /// Snapshots arriving out of order (older than the newest buffered
    /// one) are dropped.
    pub fn push(&mut self, snapshot: Snapshot) {
        if let Some(newest) = self.newest_time() {
            if snapshot.time_ms < newest {
                return;
            }
        }
        if self.snapshots.len() == BUFFER_SIZE {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    /// Produces the state to draw for the given render timestamp.
    ///
    /// The effective sample time is `render_time_ms` minus the
    /// interpolation delay. Player positions are blended between the two
    /// snapshots bracketing that time; players present only in the newer
    /// snapshot appear at their newest position. Orbs are taken from the
    /// newer snapshot unblended since they never move.
    pub fn sample(&self, render_time_ms: u64) -> Option<(Vec<Player>, Vec<Orb>)> {
        let newest = self.snapshots.back()?;
        let target = render_time_ms.saturating_sub(INTERPOLATION_DELAY_MS);

        // Not enough history or target beyond the newest snapshot:
        // render the newest state as-is
        if self.snapshots.len() == 1 || target >= newest.time_ms {
            return Some((newest.players.clone(), newest.orbs.clone()));
        }

        let oldest = self.snapshots.front()?;
        if target <= oldest.time_ms {
            return Some((oldest.players.clone(), oldest.orbs.clone()));
        }

        // Find the pair of snapshots bracketing the target time
        let mut older = oldest;
        let mut newer = newest;
        for pair in 0..self.snapshots.len() - 1 {
            let a = &self.snapshots[pair];
            let b = &self.snapshots[pair + 1];
            if a.time_ms <= target && target <= b.time_ms {
                older = a;
                newer = b;
                break;
            }
        }

        let span = newer.time_ms - older.time_ms;
        let alpha = if span == 0 {
            1.0
        } else {
            ((target - older.time_ms) as f32 / span as f32).clamp(0.0, 1.0)
        };

        let players = newer
            .players
            .iter()
            .map(|new_p| {
                let mut blended = new_p.clone();
                if let Some(old_p) = older.players.iter().find(|p| p.id == new_p.id) {
                    blended.position.x = lerp(old_p.position.x, new_p.position.x, alpha);
                    blended.position.y = lerp(old_p.position.y, new_p.position.y, alpha);
                }
                blended
            })
            .collect();

        Some((players, newer.orbs.clone()))
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
