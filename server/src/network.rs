//! Server network layer handling UDP communications and room coordination

use crate::bridge;
use crate::client_manager::ClientManager;
use crate::registry::RoomRegistry;
use crate::session::SessionEvent;
use crate::utils::get_timestamp;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{GameAction, GamePhase, Packet, RoomError, MIN_PLAYERS_TO_START};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
        addr: SocketAddr,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Main server coordinating networking and game rooms
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    registry: RoomRegistry,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Server {
    pub async fn new(addr: &str, max_clients: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            registry: RoomRegistry::new(event_tx),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, addrs } => {
                        for addr in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send packet to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for (client_id, addr) in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id, addr }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Queues a packet for every listed client that is still connected
    async fn broadcast_to(&self, recipients: &[u32], packet: &Packet) {
        let addrs = {
            let clients = self.clients.read().await;
            clients.addrs_for(recipients)
        };

        if addrs.is_empty() {
            return;
        }

        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket {
            packet: packet.clone(),
            addrs,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn client_id_for(&self, addr: SocketAddr) -> Option<u32> {
        let clients = self.clients.read().await;
        clients.find_client_by_addr(addr)
    }

    /// Processes incoming packets and updates room state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                self.handle_connect(addr, client_version).await;
            }

            Packet::Heartbeat { .. } => {
                if let Some(client_id) = self.client_id_for(addr).await {
                    self.clients.write().await.touch(client_id);
                }
            }

            Packet::CreateRoom { player_name } => {
                if let Some(client_id) = self.client_id_for(addr).await {
                    self.clients.write().await.touch(client_id);
                    self.handle_create_room(client_id, addr, &player_name).await;
                }
            }

            Packet::JoinRoom {
                player_name,
                room_code,
            } => {
                if let Some(client_id) = self.client_id_for(addr).await {
                    self.clients.write().await.touch(client_id);
                    self.handle_join_room(client_id, addr, &player_name, &room_code)
                        .await;
                }
            }

            Packet::Move { x, y, dash } => {
                if let Some(client_id) = self.client_id_for(addr).await {
                    self.clients.write().await.touch(client_id);
                    if let Some(session) = self.registry.session_for(client_id) {
                        session.lock().await.set_velocity(client_id, x, y, dash);
                    }
                }
            }

            Packet::Action { action } => {
                if let Some(client_id) = self.client_id_for(addr).await {
                    self.clients.write().await.touch(client_id);
                    self.handle_action(client_id, action).await;
                }
            }

            Packet::LeaveRoom => {
                if let Some(client_id) = self.client_id_for(addr).await {
                    self.clients.write().await.touch(client_id);
                    self.handle_leave(client_id).await;
                }
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.client_id_for(addr).await {
                    info!("Client {} disconnected", client_id);
                    self.handle_leave(client_id).await;
                    self.clients.write().await.remove_client(&client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, addr: SocketAddr, client_version: u32) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        // A fresh Connect from a known address replaces the old connection
        if let Some(existing_id) = self.client_id_for(addr).await {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.handle_leave(existing_id).await;
            self.clients.write().await.remove_client(&existing_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        if let Some(client_id) = client_id {
            let response = Packet::Connected { client_id };
            self.send_packet(&response, addr).await;
        } else {
            let response = Packet::Disconnected {
                reason: "Server full".to_string(),
            };
            self.send_packet(&response, addr).await;
        }
    }

    async fn handle_create_room(&mut self, client_id: u32, addr: SocketAddr, player_name: &str) {
        if self.registry.room_code_for(client_id).is_some() {
            debug!("Client {} is already in a room, ignoring create", client_id);
            return;
        }

        match self.registry.create_room(client_id, player_name) {
            Ok((room_code, session)) => {
                let packet = {
                    let session = session.lock().await;
                    Packet::RoomJoined {
                        room_code,
                        player_id: client_id,
                        is_host: true,
                        arena_width: shared::ARENA_WIDTH,
                        arena_height: shared::ARENA_HEIGHT,
                        players: session.players_list(),
                        orbs: session.orbs_list(),
                        phase: session.phase(),
                    }
                };
                self.send_packet(&packet, addr).await;
            }
            Err(error) => {
                self.reject_room(addr, error).await;
            }
        }
    }

    async fn handle_join_room(
        &mut self,
        client_id: u32,
        addr: SocketAddr,
        player_name: &str,
        room_code: &str,
    ) {
        if self.registry.room_code_for(client_id).is_some() {
            debug!("Client {} is already in a room, ignoring join", client_id);
            return;
        }

        match self.registry.join_room(client_id, player_name, room_code).await {
            Ok((session, _player)) => {
                let (joined, update, others) = {
                    let session = session.lock().await;
                    let players = session.players_list();
                    let orbs = session.orbs_list();
                    let phase = session.phase();
                    let others: Vec<u32> = players
                        .iter()
                        .map(|p| p.id)
                        .filter(|id| *id != client_id)
                        .collect();
                    let joined = Packet::RoomJoined {
                        room_code: session.room_code().to_string(),
                        player_id: client_id,
                        is_host: false,
                        arena_width: shared::ARENA_WIDTH,
                        arena_height: shared::ARENA_HEIGHT,
                        players: players.clone(),
                        orbs: orbs.clone(),
                        phase,
                    };
                    let update = Packet::RoomUpdate {
                        players,
                        orbs,
                        phase,
                        left_player_id: None,
                        new_host_id: None,
                    };
                    (joined, update, others)
                };
                self.send_packet(&joined, addr).await;
                self.broadcast_to(&others, &update).await;
            }
            Err(error) => {
                self.reject_room(addr, error).await;
            }
        }
    }

    async fn reject_room(&self, addr: SocketAddr, error: RoomError) {
        let message = error.to_string();
        debug!("Rejecting room request from {}: {}", addr, message);
        self.send_packet(&Packet::RoomRejected { error, message }, addr)
            .await;
    }

    async fn handle_action(&mut self, client_id: u32, action: GameAction) {
        let Some(room_code) = self.registry.room_code_for(client_id).map(String::from) else {
            return;
        };
        let Some(session) = self.registry.session_for(client_id) else {
            return;
        };

        match action {
            GameAction::Start => {
                let started = {
                    let mut session = session.lock().await;
                    session.is_host(client_id) && session.start(get_timestamp())
                };
                if started {
                    info!("Room {}: match started by client {}", room_code, client_id);
                    self.registry.start_ticker(&room_code);
                    self.broadcast_phase(&session, client_id).await;
                }
            }

            GameAction::Pause => {
                let paused = session.lock().await.pause(client_id);
                if paused {
                    info!("Room {}: paused by client {}", room_code, client_id);
                    self.registry.stop_ticker(&room_code);
                    self.broadcast_phase(&session, client_id).await;
                }
            }

            GameAction::Resume => {
                let resumed = session.lock().await.resume(client_id);
                if resumed {
                    info!("Room {}: resumed by client {}", room_code, client_id);
                    self.registry.start_ticker(&room_code);
                    self.broadcast_phase(&session, client_id).await;
                }
            }

            GameAction::Quit => {
                let quit = {
                    let mut session = session.lock().await;
                    if session.is_host(client_id) && session.phase() != GamePhase::Ended {
                        session.quit();
                        true
                    } else {
                        false
                    }
                };
                if quit {
                    info!("Room {}: match ended by host", room_code);
                    self.registry.stop_ticker(&room_code);
                    self.broadcast_phase(&session, client_id).await;
                }
            }
        }
    }

    async fn broadcast_phase(
        &self,
        session: &Arc<tokio::sync::Mutex<crate::session::GameSession>>,
        action_by: u32,
    ) {
        let (members, packet) = {
            let session = session.lock().await;
            let members: Vec<u32> = session.players_list().iter().map(|p| p.id).collect();
            let packet = Packet::PhaseChanged {
                phase: session.phase(),
                action_by,
                paused_by: session.paused_by(),
            };
            (members, packet)
        };
        self.broadcast_to(&members, &packet).await;
    }

    async fn handle_leave(&mut self, client_id: u32) {
        let Some(outcome) = self.registry.leave_room(client_id).await else {
            return;
        };

        match outcome.session {
            Some(session) => {
                let (members, update, below_minimum) = {
                    let session = session.lock().await;
                    let players = session.players_list();
                    let members: Vec<u32> = players.iter().map(|p| p.id).collect();
                    let below_minimum = session.phase() == GamePhase::Playing
                        && session.player_count() < MIN_PLAYERS_TO_START;
                    let update = Packet::RoomUpdate {
                        players,
                        orbs: session.orbs_list(),
                        phase: session.phase(),
                        left_player_id: Some(client_id),
                        new_host_id: outcome.new_host_id,
                    };
                    (members, update, below_minimum)
                };
                info!("Client {} left room {}", client_id, outcome.room_code);
                self.broadcast_to(&members, &update).await;

                // A live match cannot continue below the player minimum
                if below_minimum {
                    info!(
                        "Room {}: below minimum players, ending match",
                        outcome.room_code
                    );
                    session.lock().await.quit();
                    self.registry.stop_ticker(&outcome.room_code);
                }
            }
            None => {
                info!(
                    "Client {} left room {}, room destroyed",
                    client_id, outcome.room_code
                );
            }
        }
    }

    /// The timeout checker has already dropped the client from the table,
    /// so the notification goes to the address captured at removal time.
    async fn handle_timeout(&mut self, client_id: u32, addr: SocketAddr) {
        info!("Client {} timed out", client_id);
        self.handle_leave(client_id).await;

        self.send_packet(
            &Packet::Disconnected {
                reason: "Connection timed out".to_string(),
            },
            addr,
        )
        .await;
    }

    /// Routes a session event to the clients of the room that produced it
    async fn dispatch_session_event(&mut self, event: SessionEvent) {
        if let SessionEvent::Ended { room_code, .. } = &event {
            self.registry.stop_ticker(room_code);
        }

        let outbound = bridge::translate(event);
        if outbound.recipients.is_empty() {
            return;
        }
        self.broadcast_to(&outbound.recipients, &outbound.packet)
            .await;
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut server_rx = std::mem::replace(&mut self.server_rx, mpsc::unbounded_channel().1);
        let mut event_rx = std::mem::replace(&mut self.event_rx, mpsc::unbounded_channel().1);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id, addr }) => {
                            self.handle_timeout(client_id, addr).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle room simulation events
                event = event_rx.recv() => {
                    if let Some(event) = event {
                        self.dispatch_session_event(event).await;
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_server(max_clients: usize) -> Server {
        Server::new("127.0.0.1:0", max_clients).await.unwrap()
    }

    fn client_addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    /// Pops the next queued outbound packet, panicking when none is pending
    fn next_outbound(server: &mut Server) -> (Packet, Vec<SocketAddr>) {
        match server.game_rx.try_recv().expect("expected outbound packet") {
            GameMessage::SendPacket { packet, addr } => (packet, vec![addr]),
            GameMessage::BroadcastPacket { packet, addrs } => (packet, addrs),
        }
    }

    async fn connect(server: &mut Server, addr: SocketAddr) -> u32 {
        server
            .handle_packet(Packet::Connect { client_version: 1 }, addr)
            .await;
        match next_outbound(server).0 {
            Packet::Connected { client_id } => client_id,
            other => panic!("Expected Connected, got {:?}", other),
        }
    }

    async fn create_room(server: &mut Server, addr: SocketAddr, name: &str) -> String {
        server
            .handle_packet(
                Packet::CreateRoom {
                    player_name: name.to_string(),
                },
                addr,
            )
            .await;
        match next_outbound(server).0 {
            Packet::RoomJoined { room_code, .. } => room_code,
            other => panic!("Expected RoomJoined, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_assigns_unique_ids() {
        let mut server = test_server(16).await;
        let a = connect(&mut server, client_addr(40001)).await;
        let b = connect(&mut server, client_addr(40002)).await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_connect_rejected_when_full() {
        let mut server = test_server(1).await;
        connect(&mut server, client_addr(40010)).await;

        server
            .handle_packet(Packet::Connect { client_version: 1 }, client_addr(40011))
            .await;
        match next_outbound(&mut server).0 {
            Packet::Disconnected { reason } => assert_eq!(reason, "Server full"),
            other => panic!("Expected Disconnected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_room_makes_host() {
        let mut server = test_server(16).await;
        let addr = client_addr(40020);
        let client_id = connect(&mut server, addr).await;

        server
            .handle_packet(
                Packet::CreateRoom {
                    player_name: "Alice".to_string(),
                },
                addr,
            )
            .await;
        match next_outbound(&mut server).0 {
            Packet::RoomJoined {
                player_id,
                is_host,
                players,
                phase,
                ..
            } => {
                assert_eq!(player_id, client_id);
                assert!(is_host);
                assert_eq!(players.len(), 1);
                assert_eq!(phase, GamePhase::Waiting);
            }
            other => panic!("Expected RoomJoined, got {:?}", other),
        }
        assert_eq!(server.registry.room_count(), 1);
    }

    #[tokio::test]
    async fn test_join_unknown_room_rejected() {
        let mut server = test_server(16).await;
        let addr = client_addr(40030);
        connect(&mut server, addr).await;

        server
            .handle_packet(
                Packet::JoinRoom {
                    player_name: "Bob".to_string(),
                    room_code: "ZZZZZZ".to_string(),
                },
                addr,
            )
            .await;
        match next_outbound(&mut server).0 {
            Packet::RoomRejected { error, .. } => assert_eq!(error, RoomError::NotFound),
            other => panic!("Expected RoomRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_notifies_existing_members() {
        let mut server = test_server(16).await;
        let host_addr = client_addr(40040);
        let guest_addr = client_addr(40041);
        connect(&mut server, host_addr).await;
        connect(&mut server, guest_addr).await;

        let room_code = create_room(&mut server, host_addr, "Alice").await;
        server
            .handle_packet(
                Packet::JoinRoom {
                    player_name: "Bob".to_string(),
                    room_code,
                },
                guest_addr,
            )
            .await;

        // First the joiner's RoomJoined, then the update to the host
        match next_outbound(&mut server).0 {
            Packet::RoomJoined {
                is_host, players, ..
            } => {
                assert!(!is_host);
                assert_eq!(players.len(), 2);
            }
            other => panic!("Expected RoomJoined, got {:?}", other),
        }
        let (update, addrs) = next_outbound(&mut server);
        assert_eq!(addrs, vec![host_addr]);
        match update {
            Packet::RoomUpdate { players, .. } => assert_eq!(players.len(), 2),
            other => panic!("Expected RoomUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_leave_promotes_new_host() {
        let mut server = test_server(16).await;
        let host_addr = client_addr(40050);
        let guest_addr = client_addr(40051);
        let host_id = connect(&mut server, host_addr).await;
        let guest_id = connect(&mut server, guest_addr).await;

        let room_code = create_room(&mut server, host_addr, "Alice").await;
        server
            .handle_packet(
                Packet::JoinRoom {
                    player_name: "Bob".to_string(),
                    room_code,
                },
                guest_addr,
            )
            .await;
        next_outbound(&mut server);
        next_outbound(&mut server);

        server.handle_packet(Packet::LeaveRoom, host_addr).await;
        match next_outbound(&mut server).0 {
            Packet::RoomUpdate {
                left_player_id,
                new_host_id,
                players,
                ..
            } => {
                assert_eq!(left_player_id, Some(host_id));
                assert_eq!(new_host_id, Some(guest_id));
                assert_eq!(players.len(), 1);
                assert!(players[0].is_host);
            }
            other => panic!("Expected RoomUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_last_leave_destroys_room() {
        let mut server = test_server(16).await;
        let addr = client_addr(40055);
        connect(&mut server, addr).await;
        create_room(&mut server, addr, "Alice").await;
        assert_eq!(server.registry.room_count(), 1);

        server.handle_packet(Packet::LeaveRoom, addr).await;
        assert_eq!(server.registry.room_count(), 0);
        assert!(server.game_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_host_cannot_start() {
        let mut server = test_server(16).await;
        let host_addr = client_addr(40060);
        let guest_addr = client_addr(40061);
        connect(&mut server, host_addr).await;
        let guest_id = connect(&mut server, guest_addr).await;

        let room_code = create_room(&mut server, host_addr, "Alice").await;
        server
            .handle_packet(
                Packet::JoinRoom {
                    player_name: "Bob".to_string(),
                    room_code,
                },
                guest_addr,
            )
            .await;
        next_outbound(&mut server);
        next_outbound(&mut server);

        server
            .handle_packet(
                Packet::Action {
                    action: GameAction::Start,
                },
                guest_addr,
            )
            .await;
        assert!(server.game_rx.try_recv().is_err());

        let session = server.registry.session_for(guest_id).unwrap();
        assert_eq!(session.lock().await.phase(), GamePhase::Waiting);
    }

    #[tokio::test]
    async fn test_host_start_broadcasts_phase_change() {
        let mut server = test_server(16).await;
        let host_addr = client_addr(40070);
        let guest_addr = client_addr(40071);
        let host_id = connect(&mut server, host_addr).await;
        connect(&mut server, guest_addr).await;

        let room_code = create_room(&mut server, host_addr, "Alice").await;
        server
            .handle_packet(
                Packet::JoinRoom {
                    player_name: "Bob".to_string(),
                    room_code: room_code.clone(),
                },
                guest_addr,
            )
            .await;
        next_outbound(&mut server);
        next_outbound(&mut server);

        server
            .handle_packet(
                Packet::Action {
                    action: GameAction::Start,
                },
                host_addr,
            )
            .await;
        let (packet, addrs) = next_outbound(&mut server);
        assert_eq!(addrs.len(), 2);
        match packet {
            Packet::PhaseChanged {
                phase, action_by, ..
            } => {
                assert_eq!(phase, GamePhase::Playing);
                assert_eq!(action_by, host_id);
            }
            other => panic!("Expected PhaseChanged, got {:?}", other),
        }

        server.registry.stop_ticker(&room_code);
    }

    #[tokio::test]
    async fn test_leave_below_minimum_ends_match() {
        let mut server = test_server(16).await;
        let host_addr = client_addr(40080);
        let guest_addr = client_addr(40081);
        connect(&mut server, host_addr).await;
        let guest_id = connect(&mut server, guest_addr).await;

        let room_code = create_room(&mut server, host_addr, "Alice").await;
        server
            .handle_packet(
                Packet::JoinRoom {
                    player_name: "Bob".to_string(),
                    room_code: room_code.clone(),
                },
                guest_addr,
            )
            .await;
        next_outbound(&mut server);
        next_outbound(&mut server);

        server
            .handle_packet(
                Packet::Action {
                    action: GameAction::Start,
                },
                host_addr,
            )
            .await;
        next_outbound(&mut server);

        server.handle_packet(Packet::LeaveRoom, host_addr).await;

        let session = server.registry.session_for(guest_id).unwrap();
        assert_eq!(session.lock().await.phase(), GamePhase::Ended);
        server.registry.stop_ticker(&room_code);
    }

    #[tokio::test]
    async fn test_timeout_notifies_removed_client() {
        let mut server = test_server(16).await;
        let addr = client_addr(40090);
        let client_id = connect(&mut server, addr).await;
        create_room(&mut server, addr, "Alice").await;

        // The checker removes the client before the message reaches the loop
        server.clients.write().await.remove_client(&client_id);
        server.handle_timeout(client_id, addr).await;

        let (packet, addrs) = next_outbound(&mut server);
        match packet {
            Packet::Disconnected { reason } => assert_eq!(reason, "Connection timed out"),
            other => panic!("Expected Disconnected, got {:?}", other),
        }
        assert_eq!(addrs, vec![addr]);
        assert_eq!(server.registry.room_count(), 0);
    }

    #[tokio::test]
    async fn test_reconnect_evicts_stale_connection() {
        let mut server = test_server(16).await;
        let addr = client_addr(40091);
        let old_id = connect(&mut server, addr).await;
        create_room(&mut server, addr, "Alice").await;

        let new_id = connect(&mut server, addr).await;

        assert_ne!(old_id, new_id);
        assert_eq!(server.clients.read().await.addr_of(old_id), None);
        assert_eq!(server.registry.room_code_for(old_id), None);
        assert_eq!(server.registry.room_count(), 0);
    }
}
