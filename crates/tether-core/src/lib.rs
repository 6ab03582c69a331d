//! Core TETHER protocol types, wire layout, and constants.
//!
//! This crate provides:
//! - The fixed-layout `Packet`/`CryptPacket` wire format
//! - Peer identifiers and the seeded 64-bit corruption-check hash
//! - The plain-text drive-command and status-report mini-language
//!
//! Everything here is pure and synchronous; key handling and channel state
//! live in `tether-crypto`.

#![forbid(unsafe_code)]

pub mod command;
pub mod packet;

pub use packet::{CodecError, CryptPacket, Nonce, Packet};

use std::fmt;
use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum plaintext message size carried by a single packet.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Fixed seed for all wire-level corruption hashes.
pub const HASH_SEED: u32 = 42;

/// Random component of a nonce (crypto_box nonce length).
pub const NONCE_BYTE_LEN: usize = 24;

/// Serialized nonce: 24 random bytes + u32 counter + i64 timestamp.
pub const NONCE_WIRE_SIZE: usize = NONCE_BYTE_LEN + 4 + 8;

/// Serialized plaintext packet:
/// [nonce (36B)][message (4096B)][size (2B)][api_key (8B)][hash (8B)][timestamp (8B)]
pub const PACKET_WIRE_SIZE: usize = NONCE_WIRE_SIZE + MAX_MESSAGE_SIZE + 2 + 8 + 8 + 8;

/// crypto_box authentication tag prepended to the sealed packet.
pub const SEAL_OVERHEAD: usize = 16;

/// Sealed packet length: serialized packet plus AEAD tag.
pub const SEALED_LEN: usize = PACKET_WIRE_SIZE + SEAL_OVERHEAD;

/// Serialized crypt packet:
/// [ciphertext (4174B)][crypt_hash (8B)][cleartext nonce (36B)]
pub const CRYPT_PACKET_WIRE_SIZE: usize = SEALED_LEN + 8 + NONCE_WIRE_SIZE;

/// Telemetry older than this is treated as stale by receivers.
pub const MAX_PACKET_AGE_SECS: i64 = 30;

/// 128-bit endpoint identifier, unique per robot or ground station.
///
/// Used only as a lookup key; the halves exist because provisioning
/// transports the id as two decimal u64 strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u128);

impl PeerId {
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn from_parts(high: u64, low: u64) -> Self {
        Self(((high as u128) << 64) | low as u128)
    }

    pub const fn high(self) -> u64 {
        (self.0 >> 64) as u64
    }

    pub const fn low(self) -> u64 {
        self.0 as u64
    }

    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Seeded 64-bit non-cryptographic hash for corruption checks.
///
/// MurmurHash3 x64_128 truncated to the low 64 bits. Never an
/// authenticity check; that is the AEAD layer's job.
pub fn hash64(data: &[u8], seed: u32) -> u64 {
    let digest = murmur3::murmur3_x64_128(&mut Cursor::new(data), seed)
        .expect("in-memory cursor read cannot fail");
    digest as u64
}

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_parts_roundtrip() {
        let id = PeerId::from_parts(0x9abc_def0, 0x1234_5678);
        assert_eq!(id.high(), 0x9abc_def0);
        assert_eq!(id.low(), 0x1234_5678);
        assert_eq!(PeerId::new(id.as_u128()), id);
    }

    #[test]
    fn peer_id_display_is_fixed_width_hex() {
        let id = PeerId::from_parts(1, 2);
        assert_eq!(id.to_string().len(), 32);
    }

    #[test]
    fn hash64_is_deterministic_and_seeded() {
        let data = b"telemetry";
        assert_eq!(hash64(data, HASH_SEED), hash64(data, HASH_SEED));
        assert_ne!(hash64(data, HASH_SEED), hash64(data, HASH_SEED + 1));
        assert_ne!(hash64(data, HASH_SEED), hash64(b"telemetrz", HASH_SEED));
    }

    #[test]
    fn wire_size_constants() {
        assert_eq!(PACKET_WIRE_SIZE, 4158);
        assert_eq!(SEALED_LEN, 4174);
        assert_eq!(CRYPT_PACKET_WIRE_SIZE, 4218);
    }
}
