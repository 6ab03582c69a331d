//! Cryptography for the TETHER link.
//!
//! This crate provides:
//! - crypto_box identity keypairs for ground stations and robots
//! - Nonce generation with a strictly monotonic per-channel counter
//! - Per-peer secure channels (seal/open with anti-replay)
//! - The process-wide registry owning one channel per peer
//!
//! # Design
//!
//! The authenticated-encryption primitive is the NaCl box construction
//! (X25519 + XSalsa20-Poly1305) from the `crypto_box` crate, consumed as an
//! opaque seal/open capability. Anti-replay is a strict counter increase per
//! peer with no reorder window: the link either delivers in order or the
//! packet is rejected and the sender must transmit a fresh one.
//!
//! Nothing here suspends or locks internally beyond the per-channel mutex
//! the registry hands out; callers drive the channels from whatever
//! threading model the application uses.

#![forbid(unsafe_code)]

pub mod channel;
pub mod keys;
pub mod nonce;
pub mod registry;

pub use channel::{ChannelError, ChannelState, ChannelStats, SecureChannel};
pub use keys::BoxKeyPair;
pub use nonce::{NonceError, NonceGenerator};
pub use registry::{lock_channel, RegistryError, SecureContextRegistry, SharedChannel};
