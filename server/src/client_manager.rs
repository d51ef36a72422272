//! Client connection management for the arena server
//!
//! This module tracks every connected transport client independently of any
//! room membership:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Monotonic client id assignment and address lookup
//! - Connection health monitoring and automatic cleanup
//! - Capacity enforcement for the whole process
//!
//! Room membership lives in the registry; movement input is applied
//! straight to the owning session (last write wins), so no input queue is
//! kept here.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long a client may stay silent before it is dropped. Heartbeats
/// arrive every 2 s from well-behaved clients.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// One connected transport client.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Marks the client as recently active.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if no packets have been received within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients.
///
/// Client ids are assigned monotonically starting at 1 and are never
/// reused within a process, which keeps join order and id order aligned
/// for the rooms built on top.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection.
    ///
    /// Returns Some(client_id) if successful, None if the server is at
    /// capacity. Logs the new connection for server monitoring.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client. Returns true if the client was found and
    /// removed, false if they were already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes a client's last-seen time. Any inbound packet counts as
    /// activity, including heartbeats.
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
        }
    }

    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|c| c.addr)
    }

    /// Resolves a set of client ids to their network addresses, skipping
    /// ids that are no longer connected.
    pub fn addrs_for(&self, ids: &[u32]) -> Vec<SocketAddr> {
        ids.iter()
            .filter_map(|id| self.clients.get(id).map(|c| c.addr))
            .collect()
    }

    /// Checks for and removes timed-out clients, returning their ids and
    /// last known addresses so other systems (rooms, notifications) can
    /// clean up after them.
    pub fn check_timeouts(&mut self) -> Vec<(u32, SocketAddr)> {
        let timed_out: Vec<(u32, SocketAddr)> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, client)| (*id, client.addr))
            .collect();

        for (client_id, _) in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
