//! The decoded/encoded message entity and its field limits.

use super::status::Status;
use super::types::{DataType, FileEvent, PacketType, ProtocolVersion};


/// Maximum bytes in a resource path, excluding any terminator.
pub const PATH_LEN_MAX: usize = 79;

/// Maximum bytes in a units string.
pub const UNITS_LEN_MAX: usize = 23;

/// Maximum bytes of data in a single packet.
pub const DATA_LEN_MAX: usize = 50_000;

/// Maximum length of a timestamp string: `0000000000.000000`.
pub const TIMESTAMP_LEN_MAX: usize = 17;

/// Fixed header plus one identifier byte and one separator per variable
/// field (`T`, `P`, `U`, `D`).
pub const OVERHEAD_LEN_MAX: usize = 11;

/// Smallest valid packet: the four fixed header bytes.
pub const PACKET_LEN_MIN: usize = 4;

/// Largest packet the codec will produce or accept.
pub const PACKET_LEN_MAX: usize =
    OVERHEAD_LEN_MAX + PATH_LEN_MAX + UNITS_LEN_MAX + TIMESTAMP_LEN_MAX + DATA_LEN_MAX;


/// An ORP message, owned form.
///
/// Built by the caller and consumed by the encoder. Fields that are not
/// meaningful for the packet type are left at their defaults and ignored on
/// encode; absent optional values are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub kind: PacketType,
    /// Resource data type; meaningful on requests whose type requires it.
    pub data_type: DataType,
    /// Response status; meaningful on responses.
    pub status: Status,
    /// Protocol version; meaningful on sync packets.
    pub version: ProtocolVersion,
    /// File-transfer event; meaningful on file-control notifications.
    pub event: FileEvent,
    /// Echoed by the peer; wraps freely.
    pub sequence: u16,
    /// Seconds since the epoch; `None` when unset.
    pub timestamp: Option<f64>,
    pub path: String,
    pub unit: String,
    /// Opaque payload; may be binary on file-data packets.
    pub data: Vec<u8>,
    /// Sent packet count (sync packets only); `None` is omitted from encoding.
    pub sent_count: Option<u32>,
    /// Received packet count (sync packets only).
    pub received_count: Option<u32>,
    /// Maximum transfer unit (sync packets only).
    pub mtu: Option<u32>,
}

impl Message {
    pub fn new(kind: PacketType) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn response(kind: PacketType, status: Status) -> Self {
        Self {
            kind,
            status,
            ..Default::default()
        }
    }
}


/// An ORP message decoded from a packet buffer.
///
/// String and data fields are views into the caller-owned packet buffer and
/// are valid only as long as it is; use [`to_message`](Self::to_message) to
/// detach.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView<'a> {
    pub kind: PacketType,
    pub data_type: DataType,
    pub status: Status,
    pub version: ProtocolVersion,
    pub event: FileEvent,
    pub sequence: u16,
    pub timestamp: Option<f64>,
    pub path: &'a str,
    pub unit: &'a str,
    pub data: &'a [u8],
    pub sent_count: Option<u32>,
    pub received_count: Option<u32>,
    pub mtu: Option<u32>,
}

impl MessageView<'_> {
    pub fn to_message(&self) -> Message {
        Message {
            kind: self.kind,
            data_type: self.data_type,
            status: self.status,
            version: self.version,
            event: self.event,
            sequence: self.sequence,
            timestamp: self.timestamp,
            path: self.path.to_owned(),
            unit: self.unit.to_owned(),
            data: self.data.to_vec(),
            sent_count: self.sent_count,
            received_count: self.received_count,
            mtu: self.mtu,
        }
    }
}

impl From<MessageView<'_>> for Message {
    fn from(view: MessageView<'_>) -> Self {
        view.to_message()
    }
}
