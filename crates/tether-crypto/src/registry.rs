//! Process-wide registry of secure channels, one per known peer.
//!
//! The registry is a lookup structure, not a security boundary: all key
//! material lives inside the channels it owns. Each channel is handed out
//! behind its own mutex, which gives exactly the required discipline of one
//! seal/open in flight per peer while different peers proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crypto_box::PublicKey;
use thiserror::Error;
use tracing::info;

use crate::channel::SecureChannel;
use crate::keys::BoxKeyPair;
use tether_core::PeerId;

/// A channel as handed out by the registry.
pub type SharedChannel = Arc<Mutex<SecureChannel>>;

/// Registry lookup errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no channel registered for peer {0}")]
    NotFound(PeerId),
}

/// Owns one [`SecureChannel`] per registered peer, keyed by [`PeerId`].
#[derive(Debug, Default)]
pub struct SecureContextRegistry {
    channels: HashMap<PeerId, SharedChannel>,
}

impl SecureContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the channel for `peer_id`, replacing any existing one.
    ///
    /// Replacement closes the displaced channel and starts from fresh
    /// nonce state: a new public key invalidates the prior nonce history
    /// for that identity.
    pub fn register(
        &mut self,
        peer_id: PeerId,
        keys: BoxKeyPair,
        peer_public: PublicKey,
    ) -> SharedChannel {
        if let Some(old) = self.channels.remove(&peer_id) {
            lock_channel(&old).close();
            info!(peer = %peer_id, "replacing existing secure channel");
        }

        let channel = Arc::new(Mutex::new(SecureChannel::new(peer_id, keys, peer_public)));
        self.channels.insert(peer_id, Arc::clone(&channel));
        channel
    }

    /// Look up the channel for `peer_id`.
    pub fn get(&self, peer_id: PeerId) -> Result<SharedChannel, RegistryError> {
        self.channels
            .get(&peer_id)
            .cloned()
            .ok_or(RegistryError::NotFound(peer_id))
    }

    /// Close the channel for `peer_id` and drop it from the registry.
    pub fn unregister(&mut self, peer_id: PeerId) -> Result<(), RegistryError> {
        let channel = self
            .channels
            .remove(&peer_id)
            .ok_or(RegistryError::NotFound(peer_id))?;
        lock_channel(&channel).close();
        Ok(())
    }

    pub fn contains(&self, peer_id: PeerId) -> bool {
        self.channels.contains_key(&peer_id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.channels.keys().copied()
    }
}

/// Lock a shared channel, recovering from a poisoned mutex.
///
/// A panic mid-operation leaves the channel in a consistent state (last-seen
/// nonces only advance after full success), so continuing is safe.
pub fn lock_channel(channel: &SharedChannel) -> std::sync::MutexGuard<'_, SecureChannel> {
    channel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::Packet;

    fn registry_with_peer() -> (SecureContextRegistry, PeerId, BoxKeyPair, BoxKeyPair) {
        let mut registry = SecureContextRegistry::new();
        let own = BoxKeyPair::generate();
        let peer = BoxKeyPair::generate();
        let peer_id = PeerId::from_parts(0x9abc_def0, 0x1234_5678);
        registry.register(peer_id, own.clone(), peer.public_key());
        (registry, peer_id, own, peer)
    }

    #[test]
    fn register_and_get() {
        let (registry, peer_id, ..) = registry_with_peer();
        assert!(registry.contains(peer_id));
        assert_eq!(registry.len(), 1);
        let channel = registry.get(peer_id).unwrap();
        assert_eq!(lock_channel(&channel).peer_id(), peer_id);
    }

    #[test]
    fn get_unknown_peer_fails() {
        let registry = SecureContextRegistry::new();
        let peer_id = PeerId::from_parts(1, 2);
        assert_eq!(
            registry.get(peer_id).unwrap_err(),
            RegistryError::NotFound(peer_id)
        );
    }

    #[test]
    fn unregister_closes_channel() {
        let (mut registry, peer_id, ..) = registry_with_peer();
        let channel = registry.get(peer_id).unwrap();

        registry.unregister(peer_id).unwrap();
        assert!(!registry.contains(peer_id));
        assert!(lock_channel(&channel).is_closed());

        assert_eq!(
            registry.unregister(peer_id).unwrap_err(),
            RegistryError::NotFound(peer_id)
        );
    }

    #[test]
    fn reregistration_resets_nonce_state_and_closes_old_channel() {
        let (mut registry, peer_id, own, peer) = registry_with_peer();

        let old = registry.get(peer_id).unwrap();
        {
            let mut channel = lock_channel(&old);
            channel.encrypt(Packet::build(1, b"x").unwrap()).unwrap();
        }

        let fresh = registry.register(peer_id, own, peer.public_key());
        assert!(lock_channel(&old).is_closed());
        assert_eq!(registry.len(), 1);

        // The fresh channel starts over: first nonce counter is 1 again.
        let crypt = lock_channel(&fresh)
            .encrypt(Packet::build(1, b"y").unwrap())
            .unwrap();
        assert_eq!(crypt.nonce.counter, 1);
    }
}
