use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Angle the shade moves to on an "open" command.
pub const OPEN_ANGLE: u8 = 180;
/// Angle the shade moves to on a "close" command.
pub const CLOSE_ANGLE: u8 = 0;

/// Capability to physically move the shade.
///
/// Implementations own the angle-to-pulse mapping and any settling delay;
/// callers only deal in degrees within [0, 180].
pub trait Actuator {
    fn set_angle(&mut self, angle: u8);
}

/// Actuator that records movements in the log instead of driving hardware.
pub struct LogActuator;

impl Actuator for LogActuator {
    fn set_angle(&mut self, angle: u8) {
        info!("setting servo angle to {angle}");
    }
}

/// Commands the remote may ask the device to carry out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
}

#[derive(Debug, Error)]
#[error("unknown command: {0:?}")]
pub struct UnknownCommand(String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Command::Open),
            "close" => Ok(Command::Close),
            other => Err(UnknownCommand(other.to_owned())),
        }
    }
}

/// Carry out a single received command.
///
/// Unknown commands are reported and dropped; they never end the session.
pub fn dispatch(raw: &str, actuator: &mut impl Actuator) {
    match raw.parse::<Command>() {
        Ok(Command::Open) => {
            actuator.set_angle(OPEN_ANGLE);
            info!("shade opened");
        }
        Ok(Command::Close) => {
            actuator.set_angle(CLOSE_ANGLE);
            info!("shade closed");
        }
        Err(err) => warn!("ignoring {err}"),
    }
}
