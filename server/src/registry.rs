//! Room bookkeeping: unique code generation, create/join/leave, and the
//! connection-id -> room index. No broadcasting happens here; callers
//! notify clients after a registry operation succeeds.

use crate::session::{GameSession, SessionEvent, SessionTicker};
use log::{info, warn};
use rand::Rng;
use shared::{Player, RoomError, ROOM_CODE_ALPHABET, ROOM_CODE_LENGTH, ROOM_CODE_RETRIES};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Draws a random room code from the unambiguous alphabet.
pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// One live room: the session behind its lock plus the ticker driving it.
pub struct Room {
    pub session: Arc<Mutex<GameSession>>,
    pub ticker: SessionTicker,
}

/// What a leave changed, so the caller can notify the remaining players.
pub struct LeaveOutcome {
    pub room_code: String,
    /// None when the room emptied and was destroyed.
    pub session: Option<Arc<Mutex<GameSession>>>,
    pub was_host: bool,
    pub new_host_id: Option<u32>,
}

pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    client_rooms: HashMap<u32, String>,
    events: mpsc::UnboundedSender<SessionEvent>,
    code_gen: fn() -> String,
}

impl RoomRegistry {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self::with_code_gen(events, generate_room_code)
    }

    /// Registry with a custom code source, so collision exhaustion is
    /// reachable in tests.
    pub fn with_code_gen(
        events: mpsc::UnboundedSender<SessionEvent>,
        code_gen: fn() -> String,
    ) -> Self {
        RoomRegistry {
            rooms: HashMap::new(),
            client_rooms: HashMap::new(),
            events,
            code_gen,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Creates a room with the creator as sole player and host. Blank
    /// creator names fall back to "Host". Fails only when every code
    /// generation retry collides with a live room.
    pub fn create_room(
        &mut self,
        client_id: u32,
        name: &str,
    ) -> Result<(String, Arc<Mutex<GameSession>>), RoomError> {
        let mut code = (self.code_gen)();
        let mut attempts = 0;
        while self.rooms.contains_key(&code) && attempts < ROOM_CODE_RETRIES {
            code = (self.code_gen)();
            attempts += 1;
        }
        if self.rooms.contains_key(&code) {
            warn!(
                "Room code generation exhausted {} retries for client {}",
                ROOM_CODE_RETRIES, client_id
            );
            return Err(RoomError::CreateFailed);
        }

        let name = name.trim();
        let name = if name.is_empty() { "Host" } else { name };

        let session = Arc::new(Mutex::new(GameSession::new(
            &code,
            client_id,
            name,
            self.events.clone(),
        )));
        self.rooms.insert(
            code.clone(),
            Room {
                session: Arc::clone(&session),
                ticker: SessionTicker::default(),
            },
        );
        self.client_rooms.insert(client_id, code.clone());
        info!("Room {} created by client {}", code, client_id);
        Ok((code, session))
    }

    /// Joins an existing room by code. Rejected intents leave the
    /// registry and the room untouched.
    pub async fn join_room(
        &mut self,
        client_id: u32,
        name: &str,
        room_code: &str,
    ) -> Result<(Arc<Mutex<GameSession>>, Player), RoomError> {
        let code = room_code.trim().to_uppercase();
        if code.len() != ROOM_CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(RoomError::InvalidCode);
        }
        if name.trim().is_empty() {
            return Err(RoomError::InvalidName);
        }

        let room = self.rooms.get(&code).ok_or(RoomError::NotFound)?;
        let player = room.session.lock().await.add_player(client_id, name)?;

        self.client_rooms.insert(client_id, code);
        Ok((Arc::clone(&room.session), player))
    }

    /// Removes the client from its room. An emptied room is destroyed:
    /// ticker stopped, session dropped, code freed.
    pub async fn leave_room(&mut self, client_id: u32) -> Option<LeaveOutcome> {
        let room_code = self.client_rooms.remove(&client_id)?;

        let (was_host, new_host_id, now_empty, session) = {
            let room = self.rooms.get(&room_code)?;
            let mut session = room.session.lock().await;
            let (removed, new_host_id) = session.remove_player(client_id)?;
            (
                removed.is_host,
                new_host_id,
                session.player_count() == 0,
                Arc::clone(&room.session),
            )
        };

        if now_empty {
            if let Some(mut room) = self.rooms.remove(&room_code) {
                room.ticker.stop();
            }
            info!("Room {} destroyed", room_code);
            return Some(LeaveOutcome {
                room_code,
                session: None,
                was_host,
                new_host_id: None,
            });
        }

        Some(LeaveOutcome {
            room_code,
            session: Some(session),
            was_host,
            new_host_id,
        })
    }

    pub fn session_for(&self, client_id: u32) -> Option<Arc<Mutex<GameSession>>> {
        let code = self.client_rooms.get(&client_id)?;
        self.rooms.get(code).map(|room| Arc::clone(&room.session))
    }

    pub fn room_code_for(&self, client_id: u32) -> Option<&str> {
        self.client_rooms.get(&client_id).map(|s| s.as_str())
    }

    /// Starts the tick loop for a room. No-op for unknown codes or a
    /// loop already running.
    pub fn start_ticker(&mut self, room_code: &str) {
        if let Some(room) = self.rooms.get_mut(room_code) {
            let session = Arc::clone(&room.session);
            room.ticker.start(session);
        }
    }

    /// Stops a room's tick loop, leaving the session state frozen.
    pub fn stop_ticker(&mut self, room_code: &str) {
        if let Some(room) = self.rooms.get_mut(room_code) {
            room.ticker.stop();
        }
    }
}
