//! Connected-client tracking for the relay server
//!
//! Keeps the authoritative roster of connections: address-to-id mapping,
//! liveness timestamps, and capacity enforcement. Session membership lives
//! in the session table; this module only answers "who is this datagram
//! from" and "who has gone quiet".

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::info;

/// Inactivity window after which a client counts as disconnected.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected client.
#[derive(Debug)]
pub struct RemoteClient {
    pub id: u32,
    /// Network address for sending responses.
    pub addr: SocketAddr,
    /// Last time any packet arrived from this client.
    pub last_seen: Instant,
}

impl RemoteClient {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Roster of connected clients with a capacity limit.
pub struct ClientRegistry {
    clients: HashMap<u32, RemoteClient>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection. Returns None when at capacity.
    pub fn register(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, RemoteClient::new(client_id, addr));
        Some(client_id)
    }

    /// Removes a client. Returns true if it was present.
    pub fn remove(&mut self, client_id: u32) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Marks a client as alive right now.
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Removes every client that has gone quiet past the timeout window
    /// and returns their ids for session cleanup.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove(*client_id);
        }

        timed_out
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
    fn test_register_assigns_sequential_ids() {
        let mut registry = ClientRegistry::new(4);

        assert_eq!(registry.register(test_addr()), Some(1));
        assert_eq!(registry.register(test_addr2()), Some(2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_respects_capacity() {
        let mut registry = ClientRegistry::new(1);

        assert!(registry.register(test_addr()).is_some());
        assert_eq!(registry.register(test_addr2()), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut registry = ClientRegistry::new(2);
        let id = registry.register(test_addr()).unwrap();

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_by_addr() {
        let mut registry = ClientRegistry::new(2);
        let id = registry.register(test_addr()).unwrap();

        assert_eq!(registry.find_by_addr(test_addr()), Some(id));
        assert_eq!(registry.find_by_addr(test_addr2()), None);
    }

    #[test]
    fn test_addr_of() {
        let mut registry = ClientRegistry::new(2);
        let id = registry.register(test_addr()).unwrap();

        assert_eq!(registry.addr_of(id), Some(test_addr()));
        assert_eq!(registry.addr_of(999), None);
    }

    #[test]
    fn test_timeout_sweep() {
        let mut registry = ClientRegistry::new(2);
        let id = registry.register(test_addr()).unwrap();
        let fresh = registry.register(test_addr2()).unwrap();

        // Backdate one client beyond the window.
        registry.clients.get_mut(&id).unwrap().last_seen =
            Instant::now() - CLIENT_TIMEOUT - Duration::from_secs(1);

        let timed_out = registry.check_timeouts();
        assert_eq!(timed_out, vec![id]);
        assert_eq!(registry.len(), 1);
        assert!(registry.addr_of(fresh).is_some());
    }

    #[test]
    fn test_touch_keeps_client_alive() {
        let mut registry = ClientRegistry::new(2);
        let id = registry.register(test_addr()).unwrap();

        registry.clients.get_mut(&id).unwrap().last_seen =
            Instant::now() - CLIENT_TIMEOUT - Duration::from_secs(1);
        registry.touch(id);

        assert!(registry.check_timeouts().is_empty());
    }
}
