//! Rooms and the shareable `ADDRESS:PORT:ROOM_ID` link format.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Identifier of a room.
pub type RoomId = String;

/// One peer-to-peer session hosted by a listening peer.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Room {
    /// Opaque unique room identifier.
    room_id: RoomId,
    /// `ip:port` of the host's listener.
    host_address: String,
    /// Host player's name.
    host_name: String,
    /// Guest player's name, once joined.
    guest_name: Option<String>,
    /// Whether a guest has joined.
    is_full: bool,
}

impl Room {
    /// Creates an open room for the given host.
    #[instrument(skip(host_name), fields(host_name = %host_name))]
    pub fn new(room_id: RoomId, host_address: String, host_name: String) -> Self {
        info!(room_id = %room_id, host_address = %host_address, "Creating room");
        Self {
            room_id,
            host_address,
            host_name,
            guest_name: None,
            is_full: false,
        }
    }

    /// Generates a fresh room identifier.
    pub fn generate_id() -> RoomId {
        format!("room_{}", Uuid::new_v4().simple())
    }

    /// Records the guest and closes the room to further joins.
    #[instrument(skip(self), fields(room_id = %self.room_id))]
    pub fn admit_guest(&mut self, guest_name: String) {
        info!(guest_name = %guest_name, "Guest admitted, room is now full");
        self.guest_name = Some(guest_name);
        self.is_full = true;
    }
}

/// Connection info for a room, shared out of band.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters, Serialize, Deserialize, Display)]
#[display("{address}:{port}:{room_id}")]
pub struct RoomLink {
    /// Host IP address or name.
    address: String,
    /// Host listening port.
    port: u16,
    /// Room identifier.
    room_id: RoomId,
}

impl RoomLink {
    /// Creates a link from its parts.
    pub fn new(address: impl Into<String>, port: u16, room_id: impl Into<RoomId>) -> Self {
        Self {
            address: address.into(),
            port,
            room_id: room_id.into(),
        }
    }
}

/// Reasons a room link fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum RoomLinkError {
    /// The text does not split into exactly three colon-separated fields.
    #[display("Room link must have 3 fields separated by ':', found {count}")]
    WrongFieldCount {
        /// Number of fields found.
        count: usize,
    },

    /// A field is empty or whitespace.
    #[display("Room link is missing the {field}")]
    BlankField {
        /// Name of the blank field.
        field: &'static str,
    },

    /// The port is not a positive 16-bit integer.
    #[display("Room link port '{port}' is not a valid port number")]
    InvalidPort {
        /// The offending text.
        port: String,
    },
}

impl FromStr for RoomLink {
    type Err = RoomLinkError;

    #[instrument]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(':').collect();
        let [address, port, room_id] = fields.as_slice() else {
            debug!(count = fields.len(), "Wrong number of link fields");
            return Err(RoomLinkError::WrongFieldCount {
                count: fields.len(),
            });
        };

        for (field, value) in [("address", address), ("port", port), ("room id", room_id)] {
            if value.trim().is_empty() {
                return Err(RoomLinkError::BlankField { field });
            }
        }

        let port_num = port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| RoomLinkError::InvalidPort {
                port: port.to_string(),
            })?;

        Ok(Self::new(address.trim(), port_num, room_id.trim()))
    }
}
