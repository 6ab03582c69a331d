//! Per-peer secure channel: seal and open TETHER packets.
//!
//! A channel pairs this endpoint's keypair with one peer's public key and
//! tracks the last nonce seen from that peer. Decryption validates in a
//! fixed short-circuit order so cheap checks run before the AEAD:
//! transport hash, replay counter, AEAD open, packet codec. The last-seen
//! nonce advances only when every step succeeds, so a failed open leaves
//! the channel able to accept a legitimate retransmission.
//!
//! # Thread safety
//!
//! Not internally synchronized. The registry wraps each channel in a mutex,
//! which serializes seal/open per peer while channels for different peers
//! run in parallel.

use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox};
use thiserror::Error;
use tracing::warn;

use crate::keys::BoxKeyPair;
use crate::nonce::{NonceError, NonceGenerator};
use tether_core::{hash64, CodecError, CryptPacket, Nonce, Packet, PeerId, HASH_SEED, SEALED_LEN};

/// Secure channel errors.
///
/// None of these are silently retryable: corrupted transport may merit a
/// retransmission request upstream, but replaying the same bytes into
/// `decrypt` after a replay or authentication failure will fail identically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("transport hash mismatch on ciphertext")]
    TransportCorruption,

    #[error("replay detected: counter {counter} not above last seen {last_seen}")]
    ReplayDetected { counter: u32, last_seen: u32 },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Nonce(#[from] NonceError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Channel lifecycle. Construction is initialization, so a channel is born
/// `Ready`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Ready,
    Closed,
}

/// Per-channel operation counters.
///
/// Every failure kind is counted so callers can surface security-relevant
/// events instead of silently dropping them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelStats {
    pub packets_sealed: u64,
    pub packets_opened: u64,
    pub transport_corruptions: u64,
    pub replays_rejected: u64,
    pub auth_failures: u64,
    pub codec_failures: u64,
}

/// Encrypt/decrypt state for one remote peer.
pub struct SecureChannel {
    peer_id: PeerId,
    keys: BoxKeyPair,
    peer_public: PublicKey,
    cipher: SalsaBox,
    nonce_gen: NonceGenerator,
    last_seen: Nonce,
    state: ChannelState,
    last_failure: Option<ChannelError>,
    stats: ChannelStats,
}

impl SecureChannel {
    /// Initialize a ready channel for `peer_id`.
    pub fn new(peer_id: PeerId, keys: BoxKeyPair, peer_public: PublicKey) -> Self {
        let cipher = SalsaBox::new(&peer_public, keys.secret());
        Self {
            peer_id,
            keys,
            peer_public,
            cipher,
            nonce_gen: NonceGenerator::new(),
            last_seen: Nonce::default(),
            state: ChannelState::Ready,
            last_failure: None,
            stats: ChannelStats::default(),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ChannelState::Closed
    }

    pub fn peer_public_key(&self) -> &PublicKey {
        &self.peer_public
    }

    pub fn local_public_key(&self) -> [u8; 32] {
        self.keys.public_key_bytes()
    }

    /// Counter of the newest nonce accepted from the peer (0 initially).
    pub fn last_seen_counter(&self) -> u32 {
        self.last_seen.counter
    }

    /// The most recent failure, cleared by any subsequent success.
    pub fn last_failure(&self) -> Option<&ChannelError> {
        self.last_failure.as_ref()
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    /// Close the channel. Terminal: seal/open fail `ChannelClosed` afterwards.
    pub fn close(&mut self) {
        self.state = ChannelState::Closed;
    }

    /// Seal a packet for the peer.
    ///
    /// Assigns a fresh nonce, serializes into the fixed wire layout, seals
    /// with the peer's public key, and stamps the transport hash. Does not
    /// touch receive-side state.
    pub fn encrypt(&mut self, packet: Packet) -> Result<CryptPacket, ChannelError> {
        match self.seal(packet) {
            Ok(crypt) => {
                self.stats.packets_sealed += 1;
                self.last_failure = None;
                Ok(crypt)
            }
            Err(err) => {
                self.note_failure(&err);
                Err(err)
            }
        }
    }

    fn seal(&mut self, mut packet: Packet) -> Result<CryptPacket, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::ChannelClosed);
        }

        let nonce = self.nonce_gen.next()?;
        packet.nonce = nonce;

        let plaintext = packet.to_wire();
        let aead_nonce = crypto_box::Nonce::from(nonce.bytes);
        let ciphertext = self
            .cipher
            .encrypt(&aead_nonce, plaintext.as_ref())
            .map_err(|_| ChannelError::EncryptionFailed)?;
        if ciphertext.len() != SEALED_LEN {
            return Err(ChannelError::EncryptionFailed);
        }

        let crypt_hash = hash64(&ciphertext, HASH_SEED);
        Ok(CryptPacket {
            ciphertext,
            crypt_hash,
            nonce,
        })
    }

    /// Open a sealed packet from the peer.
    ///
    /// Validation order: transport hash, replay counter, AEAD open, packet
    /// codec. The last-seen nonce advances only on full success; any failure
    /// leaves receive-side state untouched.
    pub fn decrypt(&mut self, crypt: &CryptPacket) -> Result<Packet, ChannelError> {
        match self.open(crypt) {
            Ok(packet) => {
                self.last_seen = crypt.nonce;
                self.stats.packets_opened += 1;
                self.last_failure = None;
                Ok(packet)
            }
            Err(err) => {
                self.note_failure(&err);
                Err(err)
            }
        }
    }

    fn open(&self, crypt: &CryptPacket) -> Result<Packet, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::ChannelClosed);
        }

        if hash64(&crypt.ciphertext, HASH_SEED) != crypt.crypt_hash {
            return Err(ChannelError::TransportCorruption);
        }

        if crypt.nonce.counter <= self.last_seen.counter {
            return Err(ChannelError::ReplayDetected {
                counter: crypt.nonce.counter,
                last_seen: self.last_seen.counter,
            });
        }

        let aead_nonce = crypto_box::Nonce::from(crypt.nonce.bytes);
        let plaintext = self
            .cipher
            .decrypt(&aead_nonce, crypt.ciphertext.as_slice())
            .map_err(|_| ChannelError::AuthenticationFailed)?;

        let packet = Packet::from_wire(&plaintext)?;
        packet.payload()?;
        Ok(packet)
    }

    fn note_failure(&mut self, err: &ChannelError) {
        match err {
            ChannelError::TransportCorruption => self.stats.transport_corruptions += 1,
            ChannelError::ReplayDetected { .. } => self.stats.replays_rejected += 1,
            ChannelError::AuthenticationFailed => self.stats.auth_failures += 1,
            ChannelError::Codec(_) => self.stats.codec_failures += 1,
            _ => {}
        }
        warn!(peer = %self.peer_id, error = %err, "secure channel operation failed");
        self.last_failure = Some(err.clone());
    }
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("peer_id", &self.peer_id)
            .field("state", &self.state)
            .field("last_seen_counter", &self.last_seen.counter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::hash64;

    fn channel_pair() -> (SecureChannel, SecureChannel) {
        let ground_keys = BoxKeyPair::generate();
        let robot_keys = BoxKeyPair::generate();

        let ground_id = PeerId::from_parts(0, 1);
        let robot_id = PeerId::from_parts(0, 2);

        let ground = SecureChannel::new(robot_id, ground_keys.clone(), robot_keys.public_key());
        let robot = SecureChannel::new(ground_id, robot_keys, ground_keys.public_key());
        (ground, robot)
    }

    #[test]
    fn seal_open_roundtrip() {
        let (mut ground, mut robot) = channel_pair();

        let packet = Packet::build(1, b"PING").unwrap();
        let crypt = ground.encrypt(packet.clone()).unwrap();
        let opened = robot.decrypt(&crypt).unwrap();

        assert_eq!(opened.message, b"PING");
        assert_eq!(opened.api_key, 1);
        assert_eq!(opened.packet_hash, packet.packet_hash);
        assert_eq!(opened.timestamp, packet.timestamp);
        assert_eq!(robot.last_seen_counter(), 1);
    }

    #[test]
    fn replay_is_rejected() {
        let (mut ground, mut robot) = channel_pair();

        let crypt = ground.encrypt(Packet::build(1, b"once").unwrap()).unwrap();
        robot.decrypt(&crypt).unwrap();

        let err = robot.decrypt(&crypt).unwrap_err();
        assert_eq!(
            err,
            ChannelError::ReplayDetected {
                counter: 1,
                last_seen: 1,
            }
        );
        assert_eq!(robot.stats().replays_rejected, 1);
        assert_eq!(robot.last_failure(), Some(&err));
    }

    #[test]
    fn transport_corruption_is_caught_before_aead() {
        let (mut ground, mut robot) = channel_pair();

        let mut crypt = ground.encrypt(Packet::build(1, b"data").unwrap()).unwrap();
        crypt.ciphertext[100] ^= 0xFF;

        assert_eq!(
            robot.decrypt(&crypt).unwrap_err(),
            ChannelError::TransportCorruption
        );
        // Receive-side state must be untouched.
        assert_eq!(robot.last_seen_counter(), 0);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let (mut ground, mut robot) = channel_pair();

        let mut crypt = ground.encrypt(Packet::build(1, b"data").unwrap()).unwrap();
        crypt.ciphertext[100] ^= 0xFF;
        // Recompute the transport hash so only the AEAD can object.
        crypt.crypt_hash = hash64(&crypt.ciphertext, HASH_SEED);

        assert_eq!(
            robot.decrypt(&crypt).unwrap_err(),
            ChannelError::AuthenticationFailed
        );
        assert_eq!(robot.stats().auth_failures, 1);
        assert_eq!(robot.last_seen_counter(), 0);
    }

    #[test]
    fn failed_open_does_not_block_retransmission() {
        let (mut ground, mut robot) = channel_pair();

        let crypt = ground.encrypt(Packet::build(1, b"hello").unwrap()).unwrap();

        let mut corrupted = crypt.clone();
        corrupted.ciphertext[0] ^= 0x01;
        assert!(robot.decrypt(&corrupted).is_err());

        // The original bytes still open fine.
        assert_eq!(robot.decrypt(&crypt).unwrap().message, b"hello");
    }

    #[test]
    fn corrupted_inner_hash_surfaces_as_codec_failure() {
        let (mut ground, mut robot) = channel_pair();

        let mut packet = Packet::build(1, b"data").unwrap();
        packet.packet_hash ^= 1;
        let crypt = ground.encrypt(packet).unwrap();

        assert_eq!(
            robot.decrypt(&crypt).unwrap_err(),
            ChannelError::Codec(CodecError::HashMismatch)
        );
        assert_eq!(robot.stats().codec_failures, 1);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let (mut ground, _robot) = channel_pair();
        let (_, mut other_robot) = channel_pair();

        let crypt = ground.encrypt(Packet::build(1, b"data").unwrap()).unwrap();
        assert_eq!(
            other_robot.decrypt(&crypt).unwrap_err(),
            ChannelError::AuthenticationFailed
        );
    }

    #[test]
    fn closed_channel_refuses_both_directions() {
        let (mut ground, mut robot) = channel_pair();
        let crypt = ground.encrypt(Packet::build(1, b"bye").unwrap()).unwrap();

        ground.close();
        robot.close();

        assert_eq!(
            ground.encrypt(Packet::build(1, b"x").unwrap()).unwrap_err(),
            ChannelError::ChannelClosed
        );
        assert_eq!(robot.decrypt(&crypt).unwrap_err(), ChannelError::ChannelClosed);
    }

    #[test]
    fn success_clears_last_failure() {
        let (mut ground, mut robot) = channel_pair();

        let crypt = ground.encrypt(Packet::build(1, b"one").unwrap()).unwrap();
        robot.decrypt(&crypt).unwrap();
        assert!(robot.decrypt(&crypt).is_err());
        assert!(robot.last_failure().is_some());

        let crypt = ground.encrypt(Packet::build(1, b"two").unwrap()).unwrap();
        robot.decrypt(&crypt).unwrap();
        assert!(robot.last_failure().is_none());
    }
}
