use crate::interpolation::{InterpolationBuffer, Snapshot};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{GamePhase, Packet};
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::interval;

/// How often the client reminds the server it is alive
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Render sampling cadence (matches a 60Hz display)
const RENDER_INTERVAL: Duration = Duration::from_millis(16);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// What the client asks for once the server acknowledges the connection
#[derive(Debug, Clone)]
pub enum RoomIntent {
    Create,
    Join { room_code: String },
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    connected: bool,

    player_name: String,
    intent: RoomIntent,
    player_id: Option<u32>,
    room_code: Option<String>,
    phase: GamePhase,
    running: bool,

    buffer: InterpolationBuffer,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        player_name: &str,
        intent: RoomIntent,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            player_name: player_name.to_string(),
            intent,
            player_id: None,
            room_code: None,
            phase: GamePhase::Waiting,
            running: true,
            buffer: InterpolationBuffer::new(),
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server at {}...", self.server_addr);

        let packet = Packet::Connect { client_version: 1 };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn request_room(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let packet = match &self.intent {
            RoomIntent::Create => Packet::CreateRoom {
                player_name: self.player_name.clone(),
            },
            RoomIntent::Join { room_code } => Packet::JoinRoom {
                player_name: self.player_name.clone(),
                room_code: room_code.clone(),
            },
        };
        self.send_packet(&packet).await
    }

    async fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
                if let Err(e) = self.request_room().await {
                    error!("Failed to request room: {}", e);
                }
            }

            Packet::RoomJoined {
                room_code,
                player_id,
                is_host,
                players,
                phase,
                ..
            } => {
                info!(
                    "Entered room {} as {} ({} player(s) seated){}",
                    room_code,
                    self.player_name,
                    players.len(),
                    if is_host { ", hosting" } else { "" },
                );
                self.room_code = Some(room_code);
                self.player_id = Some(player_id);
                self.phase = phase;
            }

            Packet::RoomRejected { message, .. } => {
                error!("Room request rejected: {}", message);
                self.running = false;
            }

            Packet::RoomUpdate {
                players,
                left_player_id,
                new_host_id,
                phase,
                ..
            } => {
                if let Some(left) = left_player_id {
                    info!("Player {} left the room", left);
                }
                if let Some(host) = new_host_id {
                    info!("Player {} is the new host", host);
                }
                info!("Room now has {} player(s)", players.len());
                self.phase = phase;
            }

            Packet::GameUpdate {
                players,
                orbs,
                timer_sec,
                phase,
            } => {
                if self.phase != phase {
                    info!("Match phase: {} ({}s remaining)", phase, timer_sec);
                }
                self.phase = phase;
                self.buffer.push(Snapshot {
                    time_ms: now_ms(),
                    players,
                    orbs,
                });
            }

            Packet::TagEvent {
                tagger_id,
                tagger_name,
                tagged_id,
                tagged_name,
                scores,
            } => {
                if self.player_id == Some(tagger_id) {
                    info!("You tagged {}!", tagged_name);
                } else if self.player_id == Some(tagged_id) {
                    info!("{} tagged you!", tagger_name);
                } else {
                    info!("{} tagged {}", tagger_name, tagged_name);
                }
                if let Some(own_id) = self.player_id {
                    if let Some(score) = scores.get(&own_id) {
                        info!("Your score: {}", score);
                    }
                }
            }

            Packet::PhaseChanged {
                phase,
                action_by,
                paused_by,
            } => {
                match paused_by {
                    Some(pauser) => info!("Phase is now {} (paused by {})", phase, pauser),
                    None => info!("Phase is now {} (by player {})", phase, action_by),
                }
                self.phase = phase;
            }

            Packet::GameEnded { winner, .. } => {
                if let Some(code) = &self.room_code {
                    info!("Room {} finished", code);
                }
                match winner {
                    Some(result) => info!("Match over! Winner: {} with {}", result.name, result.score),
                    None => info!("Match over! Draw, no single winner"),
                }
                self.phase = GamePhase::Ended;
                self.running = false;
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.running = false;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Drives the connection until the server drops it or the match ends.
    ///
    /// This is a headless client: instead of drawing, each render tick
    /// samples the interpolation buffer exactly the way a renderer would
    /// and keeps the sampled state available for inspection.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut render_interval = interval(RENDER_INTERVAL);

        let mut buffer = [0u8; 2048];
        let mut render_ticks: u64 = 0;

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                self.handle_packet(packet).await;
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        let packet = Packet::Heartbeat { timestamp: now_ms() };
                        if let Err(e) = self.send_packet(&packet).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },

                _ = render_interval.tick() => {
                    render_ticks += 1;
                    if let Some((players, orbs)) = self.buffer.sample(now_ms()) {
                        // Once a second, report what a renderer would draw
                        if render_ticks % 60 == 0 {
                            info!(
                                "Rendering {} player(s), {} orb(s)",
                                players.len(),
                                orbs.len()
                            );
                        }
                    }
                },
            }

            if !self.running {
                break;
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
