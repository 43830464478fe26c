//! Control channel commands

use std::fmt;

/// Administrative command received on the control channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Stop dispatching and shut the bridge down
    Exit,
    /// Any other non-empty command string
    Unknown(String),
}

impl ControlCommand {
    /// Parse a control payload
    ///
    /// Returns `None` for an empty payload (not handled).
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let cmd = String::from_utf8_lossy(payload);
        match cmd.as_ref() {
            "" => None,
            "exit" => Some(Self::Exit),
            other => Some(Self::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit => f.write_str("exit"),
            Self::Unknown(cmd) => write!(f, "unknown({cmd})"),
        }
    }
}
