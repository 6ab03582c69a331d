//! Plain-text drive-command and status-report mini-language.
//!
//! Command frames are fixed-width: `A{compass:3}{motor:2}{duration_ms:4}#`.
//! Status frames come back either named (`S1 Ok 1636368000#`) or compact
//! (`S0010001636368000#`, 3-digit seq, 3-digit status code, unix seconds).
//! The command channel is strict; the telemetry channel is best-effort and
//! skips malformed frames.

use std::fmt;
use std::str::FromStr;

/// Mini-language errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("malformed command frame")]
    Malformed,
    #[error("compass {0} out of range (0-360)")]
    CompassOutOfRange(u16),
    #[error("motor {0} out of range (0-99)")]
    MotorOutOfRange(u8),
    #[error("duration {0} ms out of range (1-9999)")]
    DurationOutOfRange(u16),
    #[error("unknown status name: {0}")]
    UnknownStatus(String),
}

/// A single drive instruction: heading, motor power, run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveCommand {
    pub compass: u16,
    pub motor: u8,
    pub duration_ms: u16,
}

impl DriveCommand {
    /// Parse one fixed-width frame, e.g. `"A360991000#"`.
    ///
    /// Field widths are enforced; range checks beyond what the digit widths
    /// imply live in [`DriveCommand::validate`].
    pub fn parse(frame: &str) -> Result<Self, CommandError> {
        let body = frame
            .strip_prefix('A')
            .and_then(|s| s.strip_suffix('#'))
            .ok_or(CommandError::Malformed)?;
        if body.len() != 9 || !body.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CommandError::Malformed);
        }
        let compass = body[0..3].parse().map_err(|_| CommandError::Malformed)?;
        let motor = body[3..5].parse().map_err(|_| CommandError::Malformed)?;
        let duration_ms = body[5..9].parse().map_err(|_| CommandError::Malformed)?;
        let command = Self {
            compass,
            motor,
            duration_ms,
        };
        if command.duration_ms == 0 {
            return Err(CommandError::DurationOutOfRange(0));
        }
        Ok(command)
    }

    /// Range-check the command before formatting or executing it.
    pub fn validate(&self) -> Result<(), CommandError> {
        if self.compass > 360 {
            return Err(CommandError::CompassOutOfRange(self.compass));
        }
        if self.motor > 99 {
            return Err(CommandError::MotorOutOfRange(self.motor));
        }
        if self.duration_ms == 0 || self.duration_ms > 9999 {
            return Err(CommandError::DurationOutOfRange(self.duration_ms));
        }
        Ok(())
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A{:03}{:02}{:04}#",
            self.compass, self.motor, self.duration_ms
        )
    }
}

/// A parsed command with its position in the transmitted sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencedCommand {
    pub seq_nr: u8,
    pub command: DriveCommand,
}

/// Parse a concatenation of command frames (`"A...#A...#"`) into a
/// 0-indexed sequence. Any malformed frame fails the whole batch; a
/// trailing fragment without a terminator is ignored.
pub fn parse_sequence(input: &str) -> Result<Vec<SequencedCommand>, CommandError> {
    let mut out = Vec::new();
    let mut seq_nr: u8 = 0;
    let mut rest = input;
    while let Some(end) = rest.find('#') {
        let command = DriveCommand::parse(&rest[..=end])?;
        out.push(SequencedCommand { seq_nr, command });
        seq_nr = seq_nr.wrapping_add(1);
        rest = &rest[end + 1..];
    }
    Ok(out)
}

/// Command execution outcome reported back by a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Ok = 0,
    Error = 1,
    NoData = 2,
    InvalidCommand = 3,
}

impl StatusKind {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            2 => Some(Self::NoData),
            3 => Some(Self::InvalidCommand),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::Error => "Error",
            Self::NoData => "NoData",
            Self::InvalidCommand => "InvalidCommand",
        }
    }
}

impl FromStr for StatusKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ok" => Ok(Self::Ok),
            "Error" => Ok(Self::Error),
            "NoData" => Ok(Self::NoData),
            "InvalidCommand" => Ok(Self::InvalidCommand),
            other => Err(CommandError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One status frame from a robot's telemetry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub seq_nr: u8,
    pub status: StatusKind,
    pub timestamp: i64,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{} {} {}#", self.seq_nr, self.status, self.timestamp)
    }
}

impl StatusReport {
    /// Parse one frame body (without the trailing `#`), accepting the named
    /// and compact wire forms. Returns `None` on anything malformed.
    fn parse_frame(frame: &str) -> Option<Self> {
        let body = frame.strip_prefix('S')?;

        let parts: Vec<&str> = body.split_whitespace().collect();
        if parts.len() == 3 {
            return Some(Self {
                seq_nr: parts[0].parse().ok()?,
                status: parts[1].parse().ok()?,
                timestamp: parts[2].parse().ok()?,
            });
        }

        // Compact form: 3-digit seq, 3-digit status code, unix seconds.
        if body.len() > 6 && body.bytes().all(|b| b.is_ascii_digit()) {
            return Some(Self {
                seq_nr: body[0..3].parse().ok()?,
                status: StatusKind::from_code(body[3..6].parse().ok()?)?,
                timestamp: body[6..].parse().ok()?,
            });
        }

        None
    }
}

/// Parse a concatenation of status frames, skipping malformed ones.
///
/// Telemetry is best-effort: a garbled frame is dropped, the rest of the
/// batch still parses.
pub fn parse_reports(input: &str) -> Vec<StatusReport> {
    input
        .split('#')
        .filter(|frame| !frame.is_empty())
        .filter_map(StatusReport::parse_frame)
        .collect()
}
