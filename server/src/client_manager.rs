//! Session table for connected clients
//!
//! This module tracks every client the gateway has accepted:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Which room, if any, the client is currently playing in
//! - Per-room player counts, updated the moment membership changes
//!
//! A client belongs to at most one room at a time. The table itself never
//! talks to rooms; the gateway does that after updating it.

use log::info;
use shared::{ClientId, EntityId, RoomId};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client and its room membership
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: ClientId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Room the client is playing in and its player's entity id
    pub membership: Option<(RoomId, EntityId)>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            membership: None,
        }
    }

    /// Returns true if nothing has been heard from the client within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    pub fn room(&self) -> Option<RoomId> {
        self.membership.map(|(room_id, _)| room_id)
    }
}

/// Manages all connected clients
///
/// Client ids are handed out from a monotonic counter and never reused, so a
/// late packet from a departed client can never be mistaken for a new one.
pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
    by_addr: HashMap<SocketAddr, ClientId>,
    next_client_id: ClientId,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            by_addr: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a client for `addr`
    ///
    /// Returns None when the server is at capacity or the address already
    /// has a session.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients || self.by_addr.contains_key(&addr) {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));
        self.by_addr.insert(addr, client_id);

        Some(client_id)
    }

    /// Removes a client, returning its final state. Absent ids are a no-op.
    pub fn remove_client(&mut self, client_id: ClientId) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        self.by_addr.remove(&client.addr);
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ClientId> {
        self.by_addr.get(&addr).copied()
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Refreshes the client's activity timestamp
    pub fn touch(&mut self, client_id: ClientId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Records that the client now plays in `room_id`
    pub fn set_membership(&mut self, client_id: ClientId, room_id: RoomId, entity_id: EntityId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.membership = Some((room_id, entity_id));
                true
            }
            None => false,
        }
    }

    /// Clears and returns the client's membership
    pub fn clear_membership(&mut self, client_id: ClientId) -> Option<(RoomId, EntityId)> {
        self.clients.get_mut(&client_id)?.membership.take()
    }

    pub fn room_of(&self, client_id: ClientId) -> Option<RoomId> {
        self.clients.get(&client_id).and_then(|c| c.room())
    }

    /// Removes clients silent for longer than `timeout` and returns them
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Client> {
        let timed_out: Vec<ClientId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|client_id| self.remove_client(client_id))
            .collect()
    }

    /// All client ids and addresses, for server-wide broadcasts
    pub fn get_client_addrs(&self) -> Vec<(ClientId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Number of players in each of `room_ids`, including empty rooms
    pub fn room_counts(&self, room_ids: impl IntoIterator<Item = RoomId>) -> BTreeMap<RoomId, u32> {
        let mut counts: BTreeMap<RoomId, u32> = room_ids.into_iter().map(|id| (id, 0)).collect();
        for room_id in self.clients.values().filter_map(|c| c.room()) {
            *counts.entry(room_id).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new(1, test_addr());
        assert_eq!(client.id, 1);
        assert_eq!(client.addr, test_addr());
        assert!(client.membership.is_none());
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        assert_eq!(manager.add_client(test_addr()), Some(1));
        assert_eq!(manager.add_client(test_addr2()), Some(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_same_address_cannot_register_twice() {
        let mut manager = ClientManager::new(5);
        manager.add_client(test_addr()).unwrap();
        assert!(manager.add_client(test_addr()).is_none());
    }

    #[test]
    fn test_client_ids_are_not_reused() {
        let mut manager = ClientManager::new(5);
        let first = manager.add_client(test_addr()).unwrap();
        manager.remove_client(first);
        let second = manager.add_client(test_addr()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_remove_client_is_idempotent() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert!(manager.remove_client(client_id).is_some());
        assert!(manager.remove_client(client_id).is_none());
        assert!(manager.is_empty());
        assert_eq!(manager.find_client_by_addr(test_addr()), None);
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();
        manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id));
        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown), None);
    }

    #[test]
    fn test_membership_and_counts() {
        let mut manager = ClientManager::new(4);
        let a = manager.add_client(test_addr()).unwrap();
        let b = manager.add_client(test_addr2()).unwrap();

        assert!(manager.set_membership(a, 1, 10));
        assert!(manager.set_membership(b, 1, 11));
        assert_eq!(manager.room_of(a), Some(1));

        let counts = manager.room_counts([1, 2]);
        assert_eq!(counts.get(&1), Some(&2));
        assert_eq!(counts.get(&2), Some(&0));

        assert_eq!(manager.clear_membership(a), Some((1, 10)));
        assert_eq!(manager.clear_membership(a), None);
        assert_eq!(manager.room_counts([1, 2]).get(&1), Some(&1));
        assert!(!manager.set_membership(99, 1, 1));
    }

    #[test]
    fn test_check_timeouts_returns_membership() {
        let mut manager = ClientManager::new(4);
        let a = manager.add_client(test_addr()).unwrap();
        let b = manager.add_client(test_addr2()).unwrap();
        manager.set_membership(a, 2, 5);
        manager.clients.get_mut(&a).unwrap().last_seen = Instant::now() - Duration::from_secs(30);

        let expired = manager.check_timeouts(Duration::from_secs(10));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, a);
        assert_eq!(expired[0].membership, Some((2, 5)));
        assert!(manager.get(b).is_some());
        assert_eq!(manager.len(), 1);
    }
}
