//! Server acknowledgement of a pushed batch.

use crate::batch::read_fields;
use crate::error::{ProtocolError, ProtocolResult};
use std::fmt;
use tether_codec::{serialize, WireMap};

/// Field holding the acknowledgement status.
pub const FIELD_STATUS: &str = "status";
/// Field holding the server's error message.
pub const FIELD_ERROR: &str = "error";

/// Whether the server accepted a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Every item in the batch was stored.
    Ok,
    /// The batch was rejected as a whole.
    Error,
}

impl AckStatus {
    /// Returns the wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::Ok => "ok",
            AckStatus::Error => "error",
        }
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A push acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAck {
    /// Outcome.
    pub status: AckStatus,
    /// Server message, usually present on error.
    pub error: Option<String>,
}

impl PushAck {
    /// An accepting acknowledgement.
    pub fn ok() -> Self {
        Self {
            status: AckStatus::Ok,
            error: None,
        }
    }

    /// A rejecting acknowledgement.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            error: Some(message.into()),
        }
    }

    /// Returns true if the push was accepted.
    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }

    /// Reads an acknowledgement from a field map.
    pub fn from_map(map: &WireMap) -> ProtocolResult<Self> {
        let status = match map.get(FIELD_STATUS).map(String::as_str) {
            Some("ok") => AckStatus::Ok,
            Some("error") => AckStatus::Error,
            Some(other) => {
                return Err(ProtocolError::invalid_field(
                    FIELD_STATUS,
                    format!("unknown status {other:?}"),
                ))
            }
            None => return Err(ProtocolError::missing_field(FIELD_STATUS)),
        };
        Ok(Self {
            status,
            error: map.get(FIELD_ERROR).cloned(),
        })
    }

    /// Writes the acknowledgement into a field map.
    pub fn to_map(&self) -> WireMap {
        let mut map = WireMap::new();
        map.insert(FIELD_STATUS.to_string(), self.status.to_string());
        if let Some(error) = &self.error {
            map.insert(FIELD_ERROR.to_string(), error.clone());
        }
        map
    }

    /// Reads an acknowledgement from a protocol4 body.
    pub fn parse(body: &str) -> ProtocolResult<Self> {
        Self::from_map(&read_fields(body))
    }

    /// Writes the acknowledgement as a protocol4 body.
    pub fn to_body(&self) -> ProtocolResult<String> {
        Ok(serialize(&self.to_map())?)
    }
}
