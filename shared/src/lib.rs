use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const ARENA_WIDTH: f32 = 1200.0;
pub const ARENA_HEIGHT: f32 = 720.0;
pub const PLAYER_RADIUS: f32 = 25.0;
pub const MOVE_SPEED: f32 = 4.0;
pub const DASH_SCALE: f32 = 1.55;

pub const TICK_RATE: u64 = 60;
pub const TICK_MS: f32 = 1000.0 / TICK_RATE as f32;
pub const MATCH_DURATION_SEC: u64 = 300;
pub const MATCH_DURATION_TICKS: u64 = MATCH_DURATION_SEC * TICK_RATE;

pub const TAG_COOLDOWN_MS: u64 = 1000;
pub const TAG_RANGE: f32 = PLAYER_RADIUS * 2.0;

pub const ORB_SPAWN_INTERVAL_MS: u64 = 4000;
pub const ORB_SPAWN_COUNT: usize = 4;
pub const ORB_VALUES: [u32; 4] = [1, 3, 5, 10];
pub const ORB_SPAWN_PADDING: f32 = PLAYER_RADIUS + 12.0;

pub const MAX_PLAYERS: usize = 4;
pub const MIN_PLAYERS_TO_START: usize = 2;

pub const ROOM_CODE_LENGTH: usize = 6;
/// Room code alphabet; visually ambiguous characters (0/O, 1/I) excluded.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_RETRIES: usize = 20;

pub const PLAYER_COLORS: [&str; 4] = ["#e74c3c", "#3498db", "#2ecc71", "#f39c12"];

/// Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the normalized vector, or zero when the magnitude is zero.
    pub fn normalized(&self) -> Vec2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec2::default()
        } else {
            Vec2::new(self.x / mag, self.y / mag)
        }
    }

    pub fn scaled(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// Linear interpolation between two scalars.
pub fn lerp(from: f32, to: f32, alpha: f32) -> f32 {
    from + (to - from) * alpha
}

/// A player avatar in one arena. Position, velocity and score are
/// server-authoritative; clients only submit movement direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub is_host: bool,
    pub color: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub score: u32,
    pub dash: bool,
    /// Timestamp (ms) of this player's last successful tag, for the cooldown.
    pub last_tag_ms: u64,
}

impl Player {
    /// Creates a player at the deterministic spawn slot for `color_index`,
    /// spread around the arena center so avatars do not overlap at start.
    pub fn new(id: u32, name: &str, is_host: bool, color_index: usize) -> Self {
        let center_x = ARENA_WIDTH / 2.0;
        let center_y = ARENA_HEIGHT / 2.0;
        let offset = (color_index as f32 + 1.0) * 60.0;
        let x = center_x - 80.0 + (color_index % 2) as f32 * offset;
        let y = center_y - 60.0 + (color_index / 2) as f32 * offset;

        Player {
            id,
            name: name.to_string(),
            is_host,
            color: PLAYER_COLORS[color_index % PLAYER_COLORS.len()].to_string(),
            position: Vec2::new(
                x.clamp(PLAYER_RADIUS, ARENA_WIDTH - PLAYER_RADIUS),
                y.clamp(PLAYER_RADIUS, ARENA_HEIGHT - PLAYER_RADIUS),
            ),
            velocity: Vec2::default(),
            score: 0,
            dash: false,
            last_tag_ms: 0,
        }
    }

    /// Sets movement from a client direction sample. The direction is
    /// clamped to unit length before the server applies speed, so a
    /// modified client cannot move faster by sending long vectors.
    pub fn set_velocity(&mut self, x: f32, y: f32, dash: bool) {
        let dir = Vec2::new(x, y);
        let dir = if dir.magnitude() > 1.0 {
            dir.normalized()
        } else {
            dir
        };
        let speed = if dash { MOVE_SPEED * DASH_SCALE } else { MOVE_SPEED };
        self.velocity = dir.scaled(speed);
        self.dash = dash;
    }

    /// Advances position by one tick of velocity and clamps to the arena.
    pub fn integrate(&mut self) {
        self.position.x = (self.position.x + self.velocity.x)
            .clamp(PLAYER_RADIUS, ARENA_WIDTH - PLAYER_RADIUS);
        self.position.y = (self.position.y + self.velocity.y)
            .clamp(PLAYER_RADIUS, ARENA_HEIGHT - PLAYER_RADIUS);
    }

    /// Whether this player's tag cooldown has elapsed at `now_ms`.
    pub fn tag_ready(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_tag_ms) >= TAG_COOLDOWN_MS
    }
}

/// A collectible orb. Immutable once spawned; removed on collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orb {
    pub id: u32,
    pub value: u32,
    pub radius: f32,
    pub position: Vec2,
}

/// Orb radius grows with value so richer orbs are easier to see and hit.
pub fn orb_radius(value: u32) -> f32 {
    6.0 + value as f32 * 1.2
}

/// Room lifecycle states. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Waiting,
    Playing,
    Paused,
    Ended,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GamePhase::Waiting => "waiting",
            GamePhase::Playing => "playing",
            GamePhase::Paused => "paused",
            GamePhase::Ended => "ended",
        };
        write!(f, "{}", s)
    }
}

/// Match control intents a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    Start,
    Pause,
    Resume,
    Quit,
}

/// Reasons a room create/join request is rejected. These are the only
/// error identifiers that cross the wire; anything else is silently
/// dropped server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomError {
    InvalidCode,
    NotFound,
    Full,
    InvalidName,
    DuplicateName,
    CreateFailed,
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RoomError::InvalidCode => "Invalid room code.",
            RoomError::NotFound => "Room not found.",
            RoomError::Full => "Room is full (max 4 players).",
            RoomError::InvalidName => "Please enter a name.",
            RoomError::DuplicateName => "Someone in this room already has that name.",
            RoomError::CreateFailed => "Could not create room.",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for RoomError {}

/// Final standing of one player, used in the end-of-match report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerResult {
    pub id: u32,
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // client -> server
    Connect {
        client_version: u32,
    },
    Heartbeat {
        timestamp: u64,
    },
    CreateRoom {
        player_name: String,
    },
    JoinRoom {
        player_name: String,
        room_code: String,
    },
    Move {
        x: f32,
        y: f32,
        dash: bool,
    },
    Action {
        action: GameAction,
    },
    LeaveRoom,
    Disconnect,

    // server -> client
    Connected {
        client_id: u32,
    },
    RoomJoined {
        room_code: String,
        player_id: u32,
        is_host: bool,
        arena_width: f32,
        arena_height: f32,
        players: Vec<Player>,
        orbs: Vec<Orb>,
        phase: GamePhase,
    },
    RoomRejected {
        error: RoomError,
        message: String,
    },
    RoomUpdate {
        players: Vec<Player>,
        orbs: Vec<Orb>,
        phase: GamePhase,
        left_player_id: Option<u32>,
        new_host_id: Option<u32>,
    },
    GameUpdate {
        players: Vec<Player>,
        orbs: Vec<Orb>,
        timer_sec: u64,
        phase: GamePhase,
    },
    TagEvent {
        tagger_id: u32,
        tagger_name: String,
        tagged_id: u32,
        tagged_name: String,
        scores: HashMap<u32, u32>,
    },
    PhaseChanged {
        phase: GamePhase,
        action_by: u32,
        paused_by: Option<u32>,
    },
    GameEnded {
        winner: Option<PlayerResult>,
        final_scores: HashMap<u32, PlayerResult>,
    },
    Disconnected {
        reason: String,
    },
}
