//! Authoritative state for one room: roster, orbs, countdown, and the
//! waiting/playing/paused/ended state machine. All outcomes are decided
//! here; clients only submit direction samples and control intents.

use crate::collision;
use log::{debug, info};
use rand::Rng;
use shared::{
    orb_radius, GamePhase, Orb, Player, PlayerResult, RoomError, ARENA_HEIGHT, ARENA_WIDTH,
    MATCH_DURATION_TICKS, MAX_PLAYERS, MIN_PLAYERS_TO_START, ORB_SPAWN_COUNT,
    ORB_SPAWN_INTERVAL_MS, ORB_SPAWN_PADDING, ORB_VALUES, TICK_MS, TICK_RATE,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Events a session emits while it runs. Drained by the sync bridge and
/// translated into outbound packets; the session never touches a socket.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// One completed simulation step while playing.
    Tick {
        room_code: String,
        players: Vec<Player>,
        orbs: Vec<Orb>,
        timer_sec: u64,
        phase: GamePhase,
    },
    /// A successful tag, with the post-transfer score map.
    Tag {
        room_code: String,
        tagger_id: u32,
        tagger_name: String,
        tagged_id: u32,
        tagged_name: String,
        scores: HashMap<u32, u32>,
    },
    /// Fired exactly once when the match ends.
    Ended {
        room_code: String,
        winner: Option<PlayerResult>,
        final_scores: HashMap<u32, PlayerResult>,
    },
}

#[derive(Debug)]
pub struct GameSession {
    room_code: String,
    phase: GamePhase,
    /// Roster keyed by connection id. Ids are assigned monotonically, so
    /// iteration order is join order; every "first in iteration order"
    /// tie-break in the rules resolves to the lowest id.
    players: BTreeMap<u32, Player>,
    orbs: Vec<Orb>,
    next_orb_id: u32,
    /// Countdown in whole ticks. Integer so 18 000 ticks reach exactly zero.
    ticks_left: u64,
    last_orb_spawn_ms: u64,
    paused_by: Option<u32>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl GameSession {
    /// Creates a session with the creator as sole player and host.
    pub fn new(
        room_code: &str,
        host_id: u32,
        host_name: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let mut players = BTreeMap::new();
        players.insert(host_id, Player::new(host_id, host_name, true, 0));

        GameSession {
            room_code: room_code.to_string(),
            phase: GamePhase::Waiting,
            players,
            orbs: Vec::new(),
            next_orb_id: 0,
            ticks_left: MATCH_DURATION_TICKS,
            last_orb_spawn_ms: 0,
            paused_by: None,
            events,
        }
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, id: u32) -> bool {
        self.players.contains_key(&id)
    }

    pub fn is_host(&self, id: u32) -> bool {
        self.players.get(&id).map(|p| p.is_host).unwrap_or(false)
    }

    pub fn paused_by(&self) -> Option<u32> {
        self.paused_by
    }

    /// Remaining whole seconds, ceiling-rounded for display.
    pub fn timer_sec(&self) -> u64 {
        (self.ticks_left + TICK_RATE - 1) / TICK_RATE
    }

    /// Roster snapshot in join order.
    pub fn players_list(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    pub fn orbs_list(&self) -> Vec<Orb> {
        self.orbs.clone()
    }

    /// Adds a player with the next color slot. Rejects full rooms and
    /// blank or duplicate (case-insensitive, trimmed) names.
    pub fn add_player(&mut self, id: u32, name: &str) -> Result<Player, RoomError> {
        if self.players.len() >= MAX_PLAYERS {
            return Err(RoomError::Full);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(RoomError::InvalidName);
        }
        if self
            .players
            .values()
            .any(|p| p.name.eq_ignore_ascii_case(name))
        {
            return Err(RoomError::DuplicateName);
        }

        let color_index = self.players.len();
        let player = Player::new(id, name, false, color_index);
        self.players.insert(id, player.clone());
        info!("Room {}: {} joined ({} players)", self.room_code, name, self.players.len());
        Ok(player)
    }

    /// Removes a player. When the departing player held the host flag and
    /// others remain, the first remaining player (lowest id) is promoted;
    /// the new host id is returned alongside the removed player.
    pub fn remove_player(&mut self, id: u32) -> Option<(Player, Option<u32>)> {
        let removed = self.players.remove(&id)?;

        let mut new_host_id = None;
        if removed.is_host {
            if let Some(next) = self.players.values_mut().next() {
                next.is_host = true;
                new_host_id = Some(next.id);
            }
        }
        info!(
            "Room {}: {} left ({} players)",
            self.room_code,
            removed.name,
            self.players.len()
        );
        Some((removed, new_host_id))
    }

    pub fn host_id(&self) -> Option<u32> {
        self.players.values().find(|p| p.is_host).map(|p| p.id)
    }

    /// Applies a movement sample. Unknown ids are ignored; stale input
    /// from departed players is an expected race, not an error.
    pub fn set_velocity(&mut self, id: u32, x: f32, y: f32, dash: bool) {
        if let Some(player) = self.players.get_mut(&id) {
            player.set_velocity(x, y, dash);
        }
    }

    pub fn can_start(&self) -> bool {
        self.phase == GamePhase::Waiting && self.players.len() >= MIN_PLAYERS_TO_START
    }

    /// waiting -> playing. Resets the countdown, clears orbs and spawns
    /// the first wave. Returns false (no mutation) otherwise.
    pub fn start(&mut self, now_ms: u64) -> bool {
        if !self.can_start() {
            return false;
        }
        self.phase = GamePhase::Playing;
        self.ticks_left = MATCH_DURATION_TICKS;
        self.orbs.clear();
        self.next_orb_id = 0;
        self.last_orb_spawn_ms = now_ms;
        self.spawn_orbs();
        info!("Room {}: match started", self.room_code);
        true
    }

    /// playing -> paused. Records who paused for the resume permission.
    pub fn pause(&mut self, actor_id: u32) -> bool {
        if self.phase != GamePhase::Playing {
            return false;
        }
        self.phase = GamePhase::Paused;
        self.paused_by = Some(actor_id);
        info!("Room {}: paused by {}", self.room_code, actor_id);
        true
    }

    /// paused -> playing. Only the host or the player who paused may
    /// resume; timer and entities are untouched.
    pub fn resume(&mut self, actor_id: u32) -> bool {
        if self.phase != GamePhase::Paused {
            return false;
        }
        if !self.is_host(actor_id) && self.paused_by != Some(actor_id) {
            return false;
        }
        self.phase = GamePhase::Playing;
        self.paused_by = None;
        info!("Room {}: resumed by {}", self.room_code, actor_id);
        true
    }

    /// Any non-ended state -> ended. Idempotent; the end-of-match event
    /// fires exactly once.
    pub fn quit(&mut self) {
        if self.phase == GamePhase::Ended {
            return;
        }
        self.phase = GamePhase::Ended;
        let (winner, final_scores) = self.final_result();
        info!(
            "Room {}: match ended, winner {:?}",
            self.room_code,
            winner.as_ref().map(|w| w.name.as_str())
        );
        let _ = self.events.send(SessionEvent::Ended {
            room_code: self.room_code.clone(),
            winner,
            final_scores,
        });
    }

    /// Winner is the player with strictly greatest score; on a tie the
    /// first encountered in iteration order (lowest id) wins.
    pub fn final_result(&self) -> (Option<PlayerResult>, HashMap<u32, PlayerResult>) {
        let mut winner: Option<PlayerResult> = None;
        let mut final_scores = HashMap::new();

        for player in self.players.values() {
            final_scores.insert(
                player.id,
                PlayerResult {
                    id: player.id,
                    name: player.name.clone(),
                    score: player.score,
                },
            );
            let beats = winner.as_ref().map(|w| player.score > w.score).unwrap_or(true);
            if beats {
                winner = Some(PlayerResult {
                    id: player.id,
                    name: player.name.clone(),
                    score: player.score,
                });
            }
        }

        (winner, final_scores)
    }

    /// One fixed-period simulation step. No-op unless playing.
    pub fn tick(&mut self, now_ms: u64) {
        if self.phase != GamePhase::Playing {
            return;
        }

        // 1. Orb spawn cadence
        if now_ms.saturating_sub(self.last_orb_spawn_ms) >= ORB_SPAWN_INTERVAL_MS {
            self.spawn_orbs();
            self.last_orb_spawn_ms = now_ms;
        }

        // 2. Integrate positions (clamped to the arena)
        for player in self.players.values_mut() {
            player.integrate();
        }

        // 3. Tags: cooldown reset always, steal only when the tagger is
        // strictly ahead, and a steal is at most one point.
        let tags = collision::tag_pass(&self.players, now_ms);
        for tag in tags {
            self.apply_tag(tag, now_ms);
        }

        // 4. Orb collection
        let collected = collision::orb_pass(&self.players, &self.orbs);
        for (player_id, orb_id) in collected {
            let Some(index) = self.orbs.iter().position(|o| o.id == orb_id) else {
                continue;
            };
            let orb = self.orbs.remove(index);
            if let Some(player) = self.players.get_mut(&player_id) {
                player.score += orb.value;
                debug!(
                    "Room {}: {} collected orb {} (+{})",
                    self.room_code, player.name, orb.id, orb.value
                );
            }
        }

        // 5. Countdown; expiry ends the match with no further tick event.
        self.ticks_left -= 1;
        if self.ticks_left == 0 {
            self.quit();
            return;
        }

        // 6. Snapshot broadcast
        let _ = self.events.send(SessionEvent::Tick {
            room_code: self.room_code.clone(),
            players: self.players_list(),
            orbs: self.orbs.clone(),
            timer_sec: self.timer_sec(),
            phase: self.phase,
        });
    }

    fn apply_tag(&mut self, tag: collision::Tag, now_ms: u64) {
        let Some(tagged_score) = self.players.get(&tag.tagged_id).map(|p| p.score) else {
            return;
        };
        let (tagger_name, tagger_score) = {
            let Some(tagger) = self.players.get_mut(&tag.tagger_id) else {
                return;
            };
            tagger.last_tag_ms = now_ms;
            (tagger.name.clone(), tagger.score)
        };

        let transfer = if tagger_score > tagged_score {
            tagged_score.min(1)
        } else {
            0
        };
        if transfer > 0 {
            if let Some(tagger) = self.players.get_mut(&tag.tagger_id) {
                tagger.score += transfer;
            }
            if let Some(tagged) = self.players.get_mut(&tag.tagged_id) {
                tagged.score -= transfer;
            }
        }

        let tagged_name = self.players[&tag.tagged_id].name.clone();
        let scores = self.players.values().map(|p| (p.id, p.score)).collect();
        let _ = self.events.send(SessionEvent::Tag {
            room_code: self.room_code.clone(),
            tagger_id: tag.tagger_id,
            tagger_name,
            tagged_id: tag.tagged_id,
            tagged_name,
            scores,
        });
    }

    /// Spawns one wave of orbs at random positions, padded away from the
    /// walls so no orb sits flush against a bound.
    fn spawn_orbs(&mut self) {
        let mut rng = rand::thread_rng();
        for _ in 0..ORB_SPAWN_COUNT {
            let value = ORB_VALUES[rng.gen_range(0..ORB_VALUES.len())];
            let radius = orb_radius(value);
            let min_x = ORB_SPAWN_PADDING + radius;
            let max_x = (ARENA_WIDTH - ORB_SPAWN_PADDING - radius).max(min_x);
            let min_y = ORB_SPAWN_PADDING + radius;
            let max_y = (ARENA_HEIGHT - ORB_SPAWN_PADDING - radius).max(min_y);

            self.next_orb_id += 1;
            self.orbs.push(Orb {
                id: self.next_orb_id,
                value,
                radius,
                position: shared::Vec2::new(
                    min_x + rng.gen::<f32>() * (max_x - min_x),
                    min_y + rng.gen::<f32>() * (max_y - min_y),
                ),
            });
        }
    }
}

/// Owns the periodic task driving one session's tick loop. Starting and
/// stopping happen only through room lifecycle operations; a paused or
/// destroyed room has no task running at all.
#[derive(Default)]
pub struct SessionTicker {
    handle: Option<JoinHandle<()>>,
}

impl SessionTicker {
    /// Spawns the 60 Hz loop. No-op when a loop is already running.
    pub fn start(&mut self, session: Arc<Mutex<GameSession>>) {
        if let Some(handle) = &self.handle {
            if !handle.is_finished() {
                return;
            }
        }

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs_f32(TICK_MS / 1000.0));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let mut session = session.lock().await;
                session.tick(crate::utils::get_timestamp());
                if session.phase() != GamePhase::Playing {
                    break;
                }
            }
        }));
    }

    /// Cancels the loop at the next scheduling boundary. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
