//! drover CLI tools: key provisioning, command frames, diagnostics.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::{Parser, Subcommand};

use drover_ground::{GroundKeyMessage, RobotAnnounce};
use tether_core::command::{parse_reports, DriveCommand};
use tether_crypto::BoxKeyPair;

#[derive(Parser, Debug)]
#[command(name = "drover")]
#[command(about = "drover CLI tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new crypto_box keypair
    Keygen {
        /// Output file path (without extension)
        #[arg(short, long, default_value = "drover")]
        output: String,
    },

    /// Show the public key from a key file as hex
    ShowKey {
        /// Public key file path
        #[arg(short, long)]
        key: String,
    },

    /// Build a fixed-width drive-command frame
    Frame {
        /// Compass heading, 0-360
        #[arg(long)]
        compass: u16,

        /// Motor power, 0-99
        #[arg(long)]
        motor: u8,

        /// Run time in milliseconds, 1-9999
        #[arg(long)]
        duration_ms: u16,
    },

    /// Parse concatenated status frames from a robot
    ParseStatus {
        /// Raw frames, e.g. "S1 Ok 1636368000#S2 Error 1636668000#"
        frames: String,
    },

    /// Decode a robot's provisioning announce (JSON)
    Announce {
        /// The announce JSON as printed by the robot
        json: String,
    },

    /// Emit the provisioning reply for a ground public key file
    GroundKey {
        /// Public key file path
        #[arg(short, long)]
        key: String,
    },

    /// Run an in-process ground/robot exchange to check the secure link
    SelfTest,

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    drover_common::init_tracing();

    let args = Args::parse();

    match args.command {
        Command::Keygen { output } => {
            println!("Generating crypto_box keypair...");

            let keypair = BoxKeyPair::generate();

            let secret_path = format!("{}.key", output);
            let public_path = format!("{}.pub", output);

            keypair.save(&secret_path, &public_path)?;

            println!("Secret key: {}", secret_path);
            println!("Public key: {}", public_path);
            println!("Public hex: {}", hex::encode(keypair.public_key_bytes()));
        }
        Command::ShowKey { key } => {
            let public = BoxKeyPair::load_public(&key)?;
            println!("{}", hex::encode(public.as_bytes()));
        }
        Command::Frame {
            compass,
            motor,
            duration_ms,
        } => {
            let command = DriveCommand {
                compass,
                motor,
                duration_ms,
            };
            command
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid command: {e}"))?;
            println!("{command}");
        }
        Command::ParseStatus { frames } => {
            let reports = parse_reports(&frames);
            if reports.is_empty() {
                println!("No well-formed status frames.");
            }
            for report in reports {
                println!(
                    "seq {:>3}  {:<14}  at {}",
                    report.seq_nr, report.status, report.timestamp
                );
            }
        }
        Command::Announce { json } => {
            let announce = RobotAnnounce::from_json(&json)?;
            println!("Peer id:    {}", announce.peer_id()?);
            println!("Public key: {}", hex::encode(announce.public_key()?));
        }
        Command::GroundKey { key } => {
            let public = BoxKeyPair::load_public(&key)?;
            let message = GroundKeyMessage::new(public.as_bytes());
            println!("{}", message.to_json()?);
        }
        Command::SelfTest => {
            self_test()?;
        }
        Command::Version => {
            println!("drover {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Seal a command for an in-process robot, open its telemetry reply, and
/// print both legs. Exercises keygen, registry, channel, and codec without
/// touching a serial line.
fn self_test() -> Result<()> {
    use drover_ground::Groundstation;
    use tether_core::{CryptPacket, Packet, PeerId};
    use tether_crypto::{lock_channel, SecureContextRegistry};

    let ground_keys = BoxKeyPair::generate();
    let robot_keys = BoxKeyPair::generate();

    let ground_id = PeerId::from_parts(0, 1);
    let robot_id = PeerId::from_parts(0x9abc_def0, 0x1234_5678);

    let mut station = Groundstation::new(ground_keys.clone());
    station.add_robot(robot_id, "self-test", robot_keys.public_key_bytes());

    let mut robot = SecureContextRegistry::new();
    robot.register(ground_id, robot_keys, ground_keys.public_key());

    // Ground -> robot: a drive command.
    let command = DriveCommand {
        compass: 360,
        motor: 99,
        duration_ms: 1000,
    };
    let wire = station.seal_command(robot_id, 1, &command)?;
    println!("Sealed command: {} bytes on the wire", wire.len());

    let channel = robot.get(ground_id)?;
    let crypt = CryptPacket::from_wire(&wire)?;
    let packet = lock_channel(&channel)
        .decrypt(&crypt)
        .map_err(|e| anyhow::anyhow!("robot could not open command: {e}"))?;
    let (_, message) = packet.payload()?;
    println!("Robot received:  {}", String::from_utf8_lossy(message));

    // Robot -> ground: a status report.
    let report = format!("S1 Ok {}#", packet.timestamp);
    let reply = Packet::build(1, report.as_bytes())?;
    let reply_wire = lock_channel(&channel)
        .encrypt(reply)
        .map_err(|e| anyhow::anyhow!("robot could not seal reply: {e}"))?
        .to_wire();

    let reports = station.open_telemetry(robot_id, &reply_wire)?;
    for report in &reports {
        println!("Ground received: {report}");
    }
    anyhow::ensure!(reports.len() == 1, "expected exactly one status report");

    println!("Self-test OK.");
    Ok(())
}
