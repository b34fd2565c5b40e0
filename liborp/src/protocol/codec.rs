//! Packet-level codec: message structure to/from the terse ASCII wire form.

use bytes::{BufMut, BytesMut};

use super::message::{self, Message, MessageView};
use super::status::Status;
use super::types::{field, DataType, FileEvent, PacketType, ProtocolVersion, SecondByte};


/// Separator between variable-length fields.
pub const SEPARATOR: u8 = b',';

/// Offset of the first variable-length field.
pub const VARLENGTH_OFFSET: usize = 4;

/// Identifier bytes introducing each variable-length field.
pub mod field_id {
    pub const PATH: u8 = b'P';
    pub const TIME: u8 = b'T';
    pub const UNITS: u8 = b'U';
    pub const DATA: u8 = b'D';
    pub const RECV_COUNT: u8 = b'R';
    pub const SENT_COUNT: u8 = b'S';
    pub const MTU: u8 = b'M';
}


/// Encode an integer 0..=35 as a single base-36 character.
pub fn base36_encode(value: u8) -> Option<u8> {
    match value {
        0..=9 => Some(b'0' + value),
        10..=35 => Some(b'A' + value - 10),
        _ => None,
    }
}

/// Decode a single base-36 character to an integer 0..=35.
pub fn base36_decode(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'Z' => Some(c - b'A' + 10),
        _ => None,
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// Message kind has no wire representation.
    UnknownPacketType,
    PathTooLong,
    UnitsTooLong,
    /// The non-data fields alone exceed the packet limit.
    BufferTooSmall,
    /// A version or event value outside the base-36 range.
    FieldRange,
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::UnknownPacketType => write!(f, "packet type is not encodable"),
            EncodeError::PathTooLong => write!(f, "path exceeds {} bytes", message::PATH_LEN_MAX),
            EncodeError::UnitsTooLong => write!(f, "units exceed {} bytes", message::UNITS_LEN_MAX),
            EncodeError::BufferTooSmall => write!(f, "packet buffer too small"),
            EncodeError::FieldRange => write!(f, "field value out of range"),
        }
    }
}

impl std::error::Error for EncodeError {}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    TooShort,
    UnknownPacketType(u8),
    UnknownDataType(u8),
    UnknownStatus(u8),
    UnknownVersion(u8),
    UnknownEvent(u8),
    UnknownField(u8),
    InvalidTimestamp,
    InvalidCount,
    InvalidString,
    MissingField(&'static str),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::TooShort => write!(f, "packet too short"),
            DecodeError::UnknownPacketType(b) => write!(f, "unknown packet type 0x{b:02X}"),
            DecodeError::UnknownDataType(b) => write!(f, "unknown data type 0x{b:02X}"),
            DecodeError::UnknownStatus(b) => write!(f, "unknown status 0x{b:02X}"),
            DecodeError::UnknownVersion(b) => write!(f, "unknown version 0x{b:02X}"),
            DecodeError::UnknownEvent(b) => write!(f, "unknown event 0x{b:02X}"),
            DecodeError::UnknownField(b) => write!(f, "unknown field identifier 0x{b:02X}"),
            DecodeError::InvalidTimestamp => write!(f, "malformed timestamp"),
            DecodeError::InvalidCount => write!(f, "malformed counter value"),
            DecodeError::InvalidString => write!(f, "field is not valid UTF-8"),
            DecodeError::MissingField(name) => write!(f, "required {name} field missing"),
        }
    }
}

impl std::error::Error for DecodeError {}


/// Packet codec for one protocol version.
///
/// A single implementation covers both versions; encoding switches on the
/// version for the sync counter and MTU fields, which only V2 carries.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    version: ProtocolVersion,
}

impl Codec {
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Encode `msg` into `buf`, limiting the packet to `limit` bytes.
    ///
    /// Data is the only field that may be truncated to fit; the number of
    /// data bytes actually encoded is returned so a caller can continue with
    /// the remainder in a subsequent packet.
    pub fn encode(
        &self,
        msg: &Message,
        buf: &mut BytesMut,
        limit: usize,
    ) -> Result<usize, EncodeError> {
        if msg.path.len() > message::PATH_LEN_MAX {
            return Err(EncodeError::PathTooLong);
        }
        if msg.unit.len() > message::UNITS_LEN_MAX {
            return Err(EncodeError::UnitsTooLong);
        }
        if limit < message::PACKET_LEN_MIN {
            return Err(EncodeError::BufferTooSmall);
        }

        let wire = msg.kind.to_wire().ok_or(EncodeError::UnknownPacketType)?;

        let start = buf.len();
        buf.reserve(message::OVERHEAD_LEN_MAX + msg.path.len() + msg.unit.len());

        // Fixed-length fields
        buf.put_u8(wire);
        buf.put_u8(match msg.kind.second_byte() {
            SecondByte::DataType => msg.data_type.to_wire(),
            SecondByte::Status => msg.status.to_wire(),
            SecondByte::Version => {
                base36_encode(msg.version.into()).ok_or(EncodeError::FieldRange)?
            },
            SecondByte::Event => {
                base36_encode(msg.event.into()).ok_or(EncodeError::FieldRange)?
            },
        });
        buf.put_slice(&msg.sequence.to_le_bytes());

        // Variable-length fields, separators only between present fields
        let mut first = true;

        if let Some(ts) = msg.timestamp {
            separate(buf, &mut first);
            buf.put_u8(field_id::TIME);
            buf.put_slice(format_timestamp(ts).as_bytes());
        }

        if !msg.path.is_empty() || msg.kind.requires(field::PATH) {
            separate(buf, &mut first);
            buf.put_u8(field_id::PATH);
            buf.put_slice(msg.path.as_bytes());
        }

        if !msg.unit.is_empty() {
            separate(buf, &mut first);
            buf.put_u8(field_id::UNITS);
            buf.put_slice(msg.unit.as_bytes());
        }

        if buf.len() - start > limit {
            buf.truncate(start);
            return Err(EncodeError::BufferTooSmall);
        }

        // Data may be partially encoded; it is always the last field since
        // its contents may contain the separator
        let mut data_encoded = 0;
        if !msg.data.is_empty() {
            let overhead = if first { 1 } else { 2 };
            let room = limit - (buf.len() - start);
            data_encoded = msg.data.len().min(room.saturating_sub(overhead));

            if data_encoded > 0 {
                separate(buf, &mut first);
                buf.put_u8(field_id::DATA);
                buf.put_slice(&msg.data[..data_encoded]);
            }
        }

        // Version 2: counters and MTU ride on sync packets
        if msg.kind.is_sync() && self.version == ProtocolVersion::V2 {
            let counters = [
                (field_id::MTU, msg.mtu),
                (field_id::SENT_COUNT, msg.sent_count),
                (field_id::RECV_COUNT, msg.received_count),
            ];
            for (id, value) in counters {
                if let Some(value) = value {
                    separate(buf, &mut first);
                    buf.put_u8(id);
                    buf.put_slice(format!("{value}").as_bytes());
                }
            }

            if buf.len() - start > limit {
                buf.truncate(start);
                return Err(EncodeError::BufferTooSmall);
            }
        }

        Ok(data_encoded)
    }

    /// Decode a packet into a [`MessageView`] borrowing from `packet`.
    pub fn decode<'a>(&self, packet: &'a [u8]) -> Result<MessageView<'a>, DecodeError> {
        if packet.len() < message::PACKET_LEN_MIN {
            return Err(DecodeError::TooShort);
        }

        let kind =
            PacketType::from_wire(packet[0]).ok_or(DecodeError::UnknownPacketType(packet[0]))?;

        let mut view = MessageView {
            kind,
            data_type: DataType::Undef,
            status: Status::Ok,
            version: ProtocolVersion::V1,
            event: FileEvent::Info,
            sequence: u16::from_le_bytes([packet[2], packet[3]]),
            timestamp: None,
            path: "",
            unit: "",
            data: &[],
            sent_count: None,
            received_count: None,
            mtu: None,
        };

        let b1 = packet[1];
        match kind.second_byte() {
            SecondByte::DataType => {
                // not mandatory for all packets
                if kind.requires(field::DATA_TYPE) {
                    view.data_type =
                        DataType::from_wire(b1).ok_or(DecodeError::UnknownDataType(b1))?;
                }
            },
            SecondByte::Status => {
                view.status = Status::from_wire(b1).ok_or(DecodeError::UnknownStatus(b1))?;
            },
            SecondByte::Version => {
                let value = base36_decode(b1).ok_or(DecodeError::UnknownVersion(b1))?;
                view.version = ProtocolVersion::try_from(value)
                    .map_err(|_| DecodeError::UnknownVersion(b1))?;
            },
            SecondByte::Event => {
                let value = base36_decode(b1).ok_or(DecodeError::UnknownEvent(b1))?;
                view.event =
                    FileEvent::try_from(value).map_err(|_| DecodeError::UnknownEvent(b1))?;
            },
        }

        // Variable-length fields: identifier byte, content, separator
        let mut seen = field::STATUS | field::DATA_TYPE | field::VERSION | field::EVENT;
        let mut time_str: Option<&'a [u8]> = None;

        let mut i = VARLENGTH_OFFSET;
        while i < packet.len() {
            let id = packet[i];

            if id == field_id::DATA {
                // data must be the last field - stop scanning immediately
                view.data = &packet[i + 1..];
                seen |= field::DATA;
                break;
            }

            let start = i + 1;
            let end = packet[start..]
                .iter()
                .position(|b| *b == SEPARATOR)
                .map(|n| start + n)
                .unwrap_or(packet.len());
            let content = &packet[start..end];

            match id {
                field_id::PATH => {
                    view.path = as_str(content)?;
                    seen |= field::PATH;
                },
                field_id::TIME => {
                    time_str = Some(content);
                    seen |= field::TIME;
                },
                field_id::UNITS => {
                    view.unit = as_str(content)?;
                },
                field_id::RECV_COUNT => {
                    view.received_count = Some(parse_count(content)?);
                },
                field_id::SENT_COUNT => {
                    view.sent_count = Some(parse_count(content)?);
                },
                field_id::MTU => {
                    view.mtu = Some(parse_count(content)?);
                },
                id => return Err(DecodeError::UnknownField(id)),
            }

            i = end + 1;
        }

        // Timestamp validity is checked here, not inline with scanning
        if let Some(ts) = time_str {
            if !ts.is_empty() {
                view.timestamp = Some(parse_timestamp(ts)?);
            }
        }

        let missing = kind.required() & !seen;
        if missing != 0 {
            return Err(DecodeError::MissingField(field::name(
                missing & missing.wrapping_neg(),
            )));
        }

        Ok(view)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(ProtocolVersion::V2)
    }
}


fn separate(buf: &mut BytesMut, first: &mut bool) {
    if *first {
        *first = false;
    } else {
        buf.put_u8(SEPARATOR);
    }
}

/// Full-resolution decimal form, shortest representation that round-trips.
fn format_timestamp(ts: f64) -> String {
    format!("{ts:?}")
}

fn as_str(content: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(content).map_err(|_| DecodeError::InvalidString)
}

fn parse_count(content: &[u8]) -> Result<u32, DecodeError> {
    as_str(content)
        .map_err(|_| DecodeError::InvalidCount)?
        .parse()
        .map_err(|_| DecodeError::InvalidCount)
}

fn parse_timestamp(content: &[u8]) -> Result<f64, DecodeError> {
    if content.len() > message::TIMESTAMP_LEN_MAX {
        return Err(DecodeError::InvalidTimestamp);
    }

    // digits with at most one decimal point
    let mut in_decimal = false;
    for b in content {
        match b {
            b'0'..=b'9' => {},
            b'.' if !in_decimal => in_decimal = true,
            _ => return Err(DecodeError::InvalidTimestamp),
        }
    }

    as_str(content)
        .map_err(|_| DecodeError::InvalidTimestamp)?
        .parse()
        .map_err(|_| DecodeError::InvalidTimestamp)
}
