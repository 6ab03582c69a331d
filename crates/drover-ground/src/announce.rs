//! Out-of-band provisioning messages.
//!
//! An unprovisioned robot periodically prints a JSON announce on its setup
//! line: its 128-bit id as two decimal u64 strings plus its hex-encoded
//! public key. The ground station answers with its own public key. These
//! messages are trust-provisioning plumbing, not part of the secure
//! protocol; they carry no secrets.

use serde::{Deserialize, Serialize};

use drover_common::{Error, Result};
use tether_core::PeerId;

/// Hello printed by a robot awaiting provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotAnnounce {
    pub id_high: String,
    pub id_low: String,
    pub public_key: String,
}

impl RobotAnnounce {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::serialization)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::serialization)
    }

    /// The announced 128-bit peer id.
    pub fn peer_id(&self) -> Result<PeerId> {
        let high = self
            .id_high
            .parse()
            .map_err(|_| Error::protocol(format!("bad id_high: {:?}", self.id_high)))?;
        let low = self
            .id_low
            .parse()
            .map_err(|_| Error::protocol(format!("bad id_low: {:?}", self.id_low)))?;
        Ok(PeerId::from_parts(high, low))
    }

    /// The announced crypto_box public key.
    pub fn public_key(&self) -> Result<[u8; 32]> {
        decode_key(&self.public_key)
    }
}

/// Ground-station reply carrying the ground public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundKeyMessage {
    pub ground_key: String,
}

impl GroundKeyMessage {
    pub fn new(public_key: &[u8; 32]) -> Self {
        Self {
            ground_key: hex::encode(public_key),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::serialization)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::serialization)
    }

    pub fn public_key(&self) -> Result<[u8; 32]> {
        decode_key(&self.ground_key)
    }
}

fn decode_key(hex_key: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_key).map_err(Error::serialization)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::protocol(format!("public key must be 32 bytes, got {}", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announce_roundtrip() {
        let announce = RobotAnnounce {
            id_high: "11150031900141442800".to_string(),
            id_low: "305419896".to_string(),
            public_key: hex::encode([0xAB; 32]),
        };

        let json = announce.to_json().unwrap();
        let parsed = RobotAnnounce::from_json(&json).unwrap();

        assert_eq!(
            parsed.peer_id().unwrap(),
            PeerId::from_parts(11150031900141442800, 305419896)
        );
        assert_eq!(parsed.public_key().unwrap(), [0xAB; 32]);
    }

    #[test]
    fn announce_rejects_bad_id() {
        let announce = RobotAnnounce {
            id_high: "not a number".to_string(),
            id_low: "1".to_string(),
            public_key: hex::encode([0u8; 32]),
        };
        assert!(announce.peer_id().is_err());
    }

    #[test]
    fn announce_rejects_short_key() {
        let announce = RobotAnnounce {
            id_high: "1".to_string(),
            id_low: "2".to_string(),
            public_key: hex::encode([0u8; 16]),
        };
        assert!(announce.public_key().is_err());
    }

    #[test]
    fn ground_key_roundtrip() {
        let message = GroundKeyMessage::new(&[0x42; 32]);
        let json = message.to_json().unwrap();
        assert!(json.contains("ground_key"));

        let parsed = GroundKeyMessage::from_json(&json).unwrap();
        assert_eq!(parsed.public_key().unwrap(), [0x42; 32]);
    }
}
