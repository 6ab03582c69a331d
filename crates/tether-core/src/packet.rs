//! Fixed-layout packet types and their wire codec.
//!
//! All multi-byte fields are big-endian. Layouts are fixed-size for binary
//! compatibility with non-Rust endpoints; the message buffer is zero-padded
//! to [`MAX_MESSAGE_SIZE`] on the wire.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    hash64, unix_now, CRYPT_PACKET_WIRE_SIZE, HASH_SEED, MAX_MESSAGE_SIZE, NONCE_BYTE_LEN,
    PACKET_WIRE_SIZE, SEALED_LEN,
};

/// Packet codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("message of {size} bytes exceeds the 4096-byte bound")]
    MessageTooLarge { size: usize },
    #[error("packet hash mismatch")]
    HashMismatch,
    #[error("truncated input: {len} bytes")]
    Truncated { len: usize },
}

/// Freshness metadata attached to every packet.
///
/// The random bytes feed the AEAD; the counter carries the strict-increase
/// anti-replay invariant; the timestamp supports staleness policies.
/// Nonces are not secret and travel in the clear next to the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce {
    pub bytes: [u8; NONCE_BYTE_LEN],
    pub counter: u32,
    pub timestamp: i64,
}

impl Default for Nonce {
    /// The zero nonce: "nothing seen yet". Counter 0 is never produced by a
    /// generator, so any real nonce compares strictly greater.
    fn default() -> Self {
        Self {
            bytes: [0; NONCE_BYTE_LEN],
            counter: 0,
            timestamp: 0,
        }
    }
}

impl Nonce {
    fn put(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.bytes);
        buf.put_u32(self.counter);
        buf.put_i64(self.timestamp);
    }

    fn get(buf: &mut impl Buf) -> Self {
        let mut bytes = [0u8; NONCE_BYTE_LEN];
        buf.copy_to_slice(&mut bytes);
        let counter = buf.get_u32();
        let timestamp = buf.get_i64();
        Self {
            bytes,
            counter,
            timestamp,
        }
    }
}

/// Plaintext command/telemetry packet, pre-encryption.
///
/// Built via [`Packet::build`], which bounds-checks the message and stamps
/// the corruption hash; the nonce stays zeroed until a channel assigns one
/// at encrypt time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub message: Vec<u8>,
    pub api_key: u64,
    pub packet_hash: u64,
    pub timestamp: i64,
    pub nonce: Nonce,
}

impl Packet {
    /// Assemble a packet around `message` for the logical channel `api_key`.
    pub fn build(api_key: u64, message: &[u8]) -> Result<Self, CodecError> {
        if message.len() > MAX_MESSAGE_SIZE {
            return Err(CodecError::MessageTooLarge {
                size: message.len(),
            });
        }
        Ok(Self {
            message: message.to_vec(),
            api_key,
            packet_hash: hash64(message, HASH_SEED),
            timestamp: unix_now(),
            nonce: Nonce::default(),
        })
    }

    /// Validate the corruption hash and hand back the logical channel and
    /// message. A mismatch means link-layer corruption, not tampering.
    pub fn payload(&self) -> Result<(u64, &[u8]), CodecError> {
        if hash64(&self.message, HASH_SEED) != self.packet_hash {
            return Err(CodecError::HashMismatch);
        }
        Ok((self.api_key, &self.message))
    }

    /// Whether this packet's send timestamp is older than `max_age_secs`.
    pub fn is_stale(&self, now: i64, max_age_secs: i64) -> bool {
        now.saturating_sub(self.timestamp) > max_age_secs
    }

    /// Serialize to the fixed 4158-byte layout.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKET_WIRE_SIZE);
        self.nonce.put(&mut buf);
        buf.put_slice(&self.message);
        buf.put_bytes(0, MAX_MESSAGE_SIZE - self.message.len());
        buf.put_u16(self.message.len() as u16);
        buf.put_u64(self.api_key);
        buf.put_u64(self.packet_hash);
        buf.put_i64(self.timestamp);
        buf.freeze()
    }

    /// Deserialize from the fixed layout, trimming the message padding.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < PACKET_WIRE_SIZE {
            return Err(CodecError::Truncated { len: bytes.len() });
        }
        let mut buf = bytes;
        let nonce = Nonce::get(&mut buf);
        let mut message = vec![0u8; MAX_MESSAGE_SIZE];
        buf.copy_to_slice(&mut message);
        let message_size = buf.get_u16() as usize;
        if message_size > MAX_MESSAGE_SIZE {
            return Err(CodecError::MessageTooLarge { size: message_size });
        }
        message.truncate(message_size);
        let api_key = buf.get_u64();
        let packet_hash = buf.get_u64();
        let timestamp = buf.get_i64();
        Ok(Self {
            message,
            api_key,
            packet_hash,
            timestamp,
            nonce,
        })
    }
}

/// Sealed wire form of a [`Packet`].
///
/// The ciphertext is always [`SEALED_LEN`] bytes (fixed plaintext layout
/// plus AEAD tag); the crypt hash is a transport-level corruption check
/// over the ciphertext, cheaper to verify than an AEAD open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptPacket {
    pub ciphertext: Vec<u8>,
    pub crypt_hash: u64,
    pub nonce: Nonce,
}

impl CryptPacket {
    /// Serialize to the fixed 4218-byte layout.
    pub fn to_wire(&self) -> Bytes {
        debug_assert_eq!(self.ciphertext.len(), SEALED_LEN);
        let mut buf = BytesMut::with_capacity(CRYPT_PACKET_WIRE_SIZE);
        buf.put_slice(&self.ciphertext);
        buf.put_u64(self.crypt_hash);
        self.nonce.put(&mut buf);
        buf.freeze()
    }

    /// Deserialize from the fixed layout. Trailing bytes beyond the fixed
    /// size are ignored (datagram transports may pad).
    pub fn from_wire(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < CRYPT_PACKET_WIRE_SIZE {
            return Err(CodecError::Truncated { len: bytes.len() });
        }
        let mut buf = bytes;
        let mut ciphertext = vec![0u8; SEALED_LEN];
        buf.copy_to_slice(&mut ciphertext);
        let crypt_hash = buf.get_u64();
        let nonce = Nonce::get(&mut buf);
        Ok(Self {
            ciphertext,
            crypt_hash,
            nonce,
        })
    }
}
