//! The ground station: robot roster, secure link, command/telemetry plumbing.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crypto_box::PublicKey;
use tracing::{info, warn};

use drover_common::helpers::constant_time_eq;
use drover_common::{Error, Result};
use tether_core::command::{parse_reports, DriveCommand, StatusReport};
use tether_core::{unix_now, CryptPacket, Packet, PeerId, MAX_PACKET_AGE_SECS};
use tether_crypto::{lock_channel, BoxKeyPair, SecureContextRegistry, SharedChannel};

use crate::announce::RobotAnnounce;
use crate::tickets::{Ticket, TicketBook};

/// Roster entry for one provisioned robot.
#[derive(Debug, Clone)]
pub struct RobotEntry {
    pub name: String,
    pub public_key: [u8; 32],
}

/// Ground-side endpoint: owns the station keypair, the secure channel
/// registry, a named roster, and the admission wait-list.
pub struct Groundstation {
    keys: BoxKeyPair,
    registry: SecureContextRegistry,
    roster: HashMap<PeerId, RobotEntry>,
    pending: TicketBook,
}

impl Groundstation {
    pub fn new(keys: BoxKeyPair) -> Self {
        Self {
            keys,
            registry: SecureContextRegistry::new(),
            roster: HashMap::new(),
            pending: TicketBook::new(),
        }
    }

    /// The station's public key, for provisioning replies.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.keys.public_key_bytes()
    }

    /// Register a robot and open its secure channel.
    ///
    /// Re-adding an id replaces the channel and resets its nonce history.
    pub fn add_robot(
        &mut self,
        id: PeerId,
        name: impl Into<String>,
        public_key: [u8; 32],
    ) -> SharedChannel {
        let channel = self
            .registry
            .register(id, self.keys.clone(), PublicKey::from(public_key));
        self.roster.insert(
            id,
            RobotEntry {
                name: name.into(),
                public_key,
            },
        );
        info!(robot = %id, "robot registered");
        channel
    }

    /// Admit a robot from its provisioning announce.
    ///
    /// A known robot re-announcing its current key is a no-op; an unknown
    /// key re-registers the robot, invalidating the old channel.
    pub fn admit(&mut self, announce: &RobotAnnounce, name: &str) -> Result<PeerId> {
        let id = announce.peer_id()?;
        let public_key = announce.public_key()?;

        if let Some(entry) = self.roster.get(&id) {
            let known = hex::encode(entry.public_key);
            let announced = hex::encode(public_key);
            if constant_time_eq(&known, &announced) {
                return Ok(id);
            }
            warn!(robot = %id, "robot re-announced with a new key; re-registering");
        }

        self.add_robot(id, name, public_key);
        Ok(id)
    }

    pub fn remove_robot(&mut self, id: PeerId) -> Result<()> {
        self.roster
            .remove(&id)
            .ok_or_else(|| Error::not_found(format!("robot {id}")))?;
        self.registry.unregister(id).map_err(Error::not_found)?;
        Ok(())
    }

    pub fn robot_name(&self, id: PeerId) -> Option<&str> {
        self.roster.get(&id).map(|entry| entry.name.as_str())
    }

    pub fn robot_count(&self) -> usize {
        self.roster.len()
    }

    pub fn robots(&self) -> impl Iterator<Item = (&PeerId, &RobotEntry)> {
        self.roster.iter()
    }

    /// Drop every robot and close every channel.
    pub fn clear(&mut self) {
        for id in self.roster.keys() {
            let _ = self.registry.unregister(*id);
        }
        self.roster.clear();
    }

    /// Format one validated drive-command frame.
    pub fn command_string(&self, compass: u16, motor: u8, duration_ms: u16) -> Result<String> {
        let command = DriveCommand {
            compass,
            motor,
            duration_ms,
        };
        command.validate().map_err(Error::protocol)?;
        Ok(command.to_string())
    }

    /// Seal a drive command for `robot` and return the wire bytes.
    pub fn seal_command(
        &self,
        robot: PeerId,
        api_key: u64,
        command: &DriveCommand,
    ) -> Result<Vec<u8>> {
        command.validate().map_err(Error::protocol)?;
        let frame = command.to_string();

        let packet = Packet::build(api_key, frame.as_bytes()).map_err(Error::protocol)?;
        let channel = self.registry.get(robot).map_err(Error::not_found)?;
        let crypt = lock_channel(&channel)
            .encrypt(packet)
            .map_err(Error::crypto)?;
        Ok(crypt.to_wire().to_vec())
    }

    /// Open a sealed telemetry packet from `robot` and parse its status
    /// frames. Stale packets are rejected; malformed frames inside a valid
    /// packet are skipped.
    pub fn open_telemetry(&self, robot: PeerId, wire: &[u8]) -> Result<Vec<StatusReport>> {
        let crypt = CryptPacket::from_wire(wire).map_err(Error::protocol)?;
        let channel = self.registry.get(robot).map_err(Error::not_found)?;
        let packet = lock_channel(&channel)
            .decrypt(&crypt)
            .map_err(Error::crypto)?;

        if packet.is_stale(unix_now(), MAX_PACKET_AGE_SECS) {
            return Err(Error::protocol(format!("stale telemetry from {robot}")));
        }

        let (_api_key, message) = packet.payload().map_err(Error::protocol)?;
        let text = std::str::from_utf8(message)
            .map_err(|_| Error::protocol("telemetry is not valid UTF-8"))?;
        Ok(parse_reports(text))
    }

    /// Parse status frames from the legacy plain-text channel.
    pub fn process_response(&self, response: &str) -> Vec<StatusReport> {
        parse_reports(response)
    }

    /// Put a not-yet-provisioned robot on the wait-list.
    pub fn defer_robot(&mut self, ticket_id: u16, addr: Ipv4Addr, wait_ms: u16) {
        self.pending.create(ticket_id, addr, wait_ms);
    }

    /// Take a deferred robot off the wait-list.
    pub fn admit_deferred(&mut self, ticket_id: u16) -> Option<Ticket> {
        self.pending.remove(ticket_id)
    }

    pub fn pending(&self) -> &TicketBook {
        &self.pending
    }
}
