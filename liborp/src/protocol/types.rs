//! Packet types, resource data types, protocol versions, and file-transfer
//! events, together with the static per-packet-type wire table.

use num_enum::{IntoPrimitive, TryFromPrimitive};


/// Bit set on the packet type of a response.
pub const RESPONSE_MASK: u8 = 0x80;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PacketType {
    #[default]
    Unknown = 0,

    InputCreate = 1,
    InputCreateResp = 1 | RESPONSE_MASK,

    OutputCreate = 2,
    OutputCreateResp = 2 | RESPONSE_MASK,

    Delete = 3,
    DeleteResp = 3 | RESPONSE_MASK,

    HandlerAdd = 4,
    HandlerAddResp = 4 | RESPONSE_MASK,

    HandlerRemove = 5,
    HandlerRemoveResp = 5 | RESPONSE_MASK,

    Push = 6,
    PushResp = 6 | RESPONSE_MASK,

    Get = 7,
    GetResp = 7 | RESPONSE_MASK,

    ExampleSet = 8,
    ExampleSetResp = 8 | RESPONSE_MASK,

    SensorCreate = 9,
    SensorCreateResp = 9 | RESPONSE_MASK,

    SensorRemove = 10,
    SensorRemoveResp = 10 | RESPONSE_MASK,

    HandlerCall = 11,
    HandlerCallResp = 11 | RESPONSE_MASK,

    SensorCall = 12,
    SensorCallResp = 12 | RESPONSE_MASK,

    SyncSyn = 13,
    SyncSynAck = 14,
    SyncAck = 15,

    FileData = 16,
    FileDataResp = 16 | RESPONSE_MASK,

    FileControl = 17,
    FileControlResp = 17 | RESPONSE_MASK,

    UnknownRqstResp = RESPONSE_MASK,
}

/// Interpretation of the second wire byte of a packet. Exactly one per
/// packet type, fixed by the wire table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondByte {
    DataType,
    Status,
    Version,
    Event,
}

/// Bitmask values naming the fields a packet type requires.
pub mod field {
    pub const STATUS: u16 = 0x0001;
    pub const DATA_TYPE: u16 = 0x0002;
    pub const VERSION: u16 = 0x0004;
    pub const EVENT: u16 = 0x0008;
    pub const PATH: u16 = 0x0010;
    pub const TIME: u16 = 0x0020;
    pub const DATA: u16 = 0x0040;

    pub fn name(mask: u16) -> &'static str {
        match mask {
            STATUS => "status",
            DATA_TYPE => "data type",
            VERSION => "version",
            EVENT => "event",
            PATH => "path",
            TIME => "time",
            DATA => "data",
            _ => "unknown",
        }
    }
}

struct PacketInfo {
    wire: u8,
    kind: PacketType,
    second: SecondByte,
    required: u16,
}

/// Wire letter, second-byte interpretation, and required fields for every
/// packet type.
static PACKET_TABLE: &[PacketInfo] = &[
    PacketInfo { wire: b'I', kind: PacketType::InputCreate,     second: SecondByte::DataType, required: field::DATA_TYPE | field::PATH },
    PacketInfo { wire: b'i', kind: PacketType::InputCreateResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'O', kind: PacketType::OutputCreate,     second: SecondByte::DataType, required: field::DATA_TYPE | field::PATH },
    PacketInfo { wire: b'o', kind: PacketType::OutputCreateResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'D', kind: PacketType::Delete,     second: SecondByte::DataType, required: field::PATH },
    PacketInfo { wire: b'd', kind: PacketType::DeleteResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'H', kind: PacketType::HandlerAdd,     second: SecondByte::DataType, required: field::PATH },
    PacketInfo { wire: b'h', kind: PacketType::HandlerAddResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'K', kind: PacketType::HandlerRemove,     second: SecondByte::DataType, required: field::PATH },
    PacketInfo { wire: b'k', kind: PacketType::HandlerRemoveResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'P', kind: PacketType::Push,     second: SecondByte::DataType, required: field::DATA_TYPE | field::PATH },
    PacketInfo { wire: b'p', kind: PacketType::PushResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'G', kind: PacketType::Get,     second: SecondByte::DataType, required: field::PATH },
    PacketInfo { wire: b'g', kind: PacketType::GetResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'E', kind: PacketType::ExampleSet,     second: SecondByte::DataType, required: field::DATA_TYPE | field::PATH },
    PacketInfo { wire: b'e', kind: PacketType::ExampleSetResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'S', kind: PacketType::SensorCreate,     second: SecondByte::DataType, required: field::DATA_TYPE | field::PATH },
    PacketInfo { wire: b's', kind: PacketType::SensorCreateResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'R', kind: PacketType::SensorRemove,     second: SecondByte::DataType, required: field::PATH },
    PacketInfo { wire: b'r', kind: PacketType::SensorRemoveResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'c', kind: PacketType::HandlerCall,     second: SecondByte::DataType, required: field::TIME | field::PATH },
    PacketInfo { wire: b'C', kind: PacketType::HandlerCallResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'b', kind: PacketType::SensorCall,     second: SecondByte::DataType, required: field::PATH },
    PacketInfo { wire: b'B', kind: PacketType::SensorCallResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'Y', kind: PacketType::SyncSyn,    second: SecondByte::Version, required: field::VERSION },
    PacketInfo { wire: b'y', kind: PacketType::SyncSynAck, second: SecondByte::Version, required: field::VERSION },
    PacketInfo { wire: b'z', kind: PacketType::SyncAck,    second: SecondByte::Version, required: field::VERSION },

    PacketInfo { wire: b'T', kind: PacketType::FileData,     second: SecondByte::DataType, required: field::DATA },
    PacketInfo { wire: b't', kind: PacketType::FileDataResp, second: SecondByte::Status,   required: field::STATUS },

    PacketInfo { wire: b'L', kind: PacketType::FileControl,     second: SecondByte::Event,  required: field::EVENT },
    PacketInfo { wire: b'l', kind: PacketType::FileControlResp, second: SecondByte::Status, required: field::STATUS },

    PacketInfo { wire: b'?', kind: PacketType::UnknownRqstResp, second: SecondByte::Status, required: 0 },
];

impl PacketType {
    pub fn is_response(self) -> bool {
        (self as u8) & RESPONSE_MASK != 0
    }

    pub fn from_wire(byte: u8) -> Option<PacketType> {
        PACKET_TABLE.iter().find(|e| e.wire == byte).map(|e| e.kind)
    }

    pub fn to_wire(self) -> Option<u8> {
        self.info().map(|e| e.wire)
    }

    /// Which of data type, status, version, or event the second wire byte
    /// carries for this packet type.
    pub fn second_byte(self) -> SecondByte {
        self.info().map(|e| e.second).unwrap_or(SecondByte::DataType)
    }

    /// Bitmask of [`field`] values required on encode and verified on decode.
    pub fn required(self) -> u16 {
        self.info().map(|e| e.required).unwrap_or(0)
    }

    pub fn requires(self, mask: u16) -> bool {
        self.required() & mask != 0
    }

    fn info(self) -> Option<&'static PacketInfo> {
        PACKET_TABLE.iter().find(|e| e.kind == self)
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketType::Unknown => "Unknown packet type",
            PacketType::InputCreate => "Request, input create",
            PacketType::InputCreateResp => "Response, input create",
            PacketType::OutputCreate => "Request, output create",
            PacketType::OutputCreateResp => "Response, output create",
            PacketType::Delete => "Request, delete",
            PacketType::DeleteResp => "Response, delete",
            PacketType::HandlerAdd => "Request, handler add",
            PacketType::HandlerAddResp => "Response, handler add",
            PacketType::HandlerRemove => "Request, handler remove",
            PacketType::HandlerRemoveResp => "Response, handler remove",
            PacketType::Push => "Request, push",
            PacketType::PushResp => "Response, push",
            PacketType::Get => "Request, get",
            PacketType::GetResp => "Response, get",
            PacketType::ExampleSet => "Request, set example",
            PacketType::ExampleSetResp => "Response, set example",
            PacketType::SensorCreate => "Request, sensor create",
            PacketType::SensorCreateResp => "Response, sensor create",
            PacketType::SensorRemove => "Request, sensor remove",
            PacketType::SensorRemoveResp => "Response, sensor remove",
            PacketType::HandlerCall => "Notification, handler called",
            PacketType::HandlerCallResp => "Response, handler called",
            PacketType::SensorCall => "Notification, sensor call",
            PacketType::SensorCallResp => "Response, sensor call",
            PacketType::SyncSyn => "Synchronization, sync",
            PacketType::SyncSynAck => "Synchronization, sync-ack",
            PacketType::SyncAck => "Synchronization, ack",
            PacketType::FileData => "Request, file transfer data",
            PacketType::FileDataResp => "Response, file transfer data",
            PacketType::FileControl => "Notification, file transfer control",
            PacketType::FileControlResp => "Response, file transfer control",
            PacketType::UnknownRqstResp => "Response, unknown request",
        }
    }

    pub fn is_sync(self) -> bool {
        matches!(self, PacketType::SyncSyn | PacketType::SyncSynAck | PacketType::SyncAck)
    }
}


/// Data type of a resource sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    Trigger,
    Boolean,
    Numeric,
    String,
    Json,
    #[default]
    Undef,
}

impl DataType {
    pub fn from_wire(byte: u8) -> Option<DataType> {
        match byte {
            b'T' => Some(DataType::Trigger),
            b'B' => Some(DataType::Boolean),
            b'N' => Some(DataType::Numeric),
            b'S' => Some(DataType::String),
            b'J' => Some(DataType::Json),
            b' ' => Some(DataType::Undef),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            DataType::Trigger => b'T',
            DataType::Boolean => b'B',
            DataType::Numeric => b'N',
            DataType::String => b'S',
            DataType::Json => b'J',
            DataType::Undef => b' ',
        }
    }
}


/// Supported protocol versions, negotiated via the sync handshake.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
pub enum ProtocolVersion {
    #[default]
    V1 = 0,
    V2 = 1,
}


/// Event codes carried on file-transfer control notifications.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
pub enum FileEvent {
    #[default]
    Info = 0,
    Ready = 1,
    Pending = 2,
    Start = 3,
    Suspend = 4,
    Resume = 5,
    Complete = 6,
    Abort = 7,
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_response_mask() {
        assert!(!PacketType::Push.is_response());
        assert!(PacketType::PushResp.is_response());
        assert!(PacketType::UnknownRqstResp.is_response());
        assert!(!PacketType::SyncSyn.is_response());
        assert_eq!(PacketType::PushResp as u8, PacketType::Push as u8 | RESPONSE_MASK);
    }

    #[test]
    fn test_wire_roundtrip() {
        for e in PACKET_TABLE {
            assert_eq!(PacketType::from_wire(e.wire), Some(e.kind));
            assert_eq!(e.kind.to_wire(), Some(e.wire));
        }
        assert_eq!(PacketType::from_wire(b'x'), None);
        assert_eq!(PacketType::Unknown.to_wire(), None);
    }

    #[test]
    fn test_second_byte_exclusive() {
        // responses carry status, sync carries version, file control carries
        // an event, everything else carries the data type
        assert_eq!(PacketType::Push.second_byte(), SecondByte::DataType);
        assert_eq!(PacketType::PushResp.second_byte(), SecondByte::Status);
        assert_eq!(PacketType::SyncSyn.second_byte(), SecondByte::Version);
        assert_eq!(PacketType::FileControl.second_byte(), SecondByte::Event);
        assert_eq!(PacketType::FileControlResp.second_byte(), SecondByte::Status);
    }

    #[test]
    fn test_required_fields() {
        assert!(PacketType::Push.requires(field::PATH));
        assert!(PacketType::Push.requires(field::DATA_TYPE));
        assert!(!PacketType::Push.requires(field::TIME));
        assert!(PacketType::HandlerCall.requires(field::TIME));
        assert!(PacketType::FileData.requires(field::DATA));
        assert_eq!(PacketType::UnknownRqstResp.required(), 0);
    }

    #[test]
    fn test_data_type_wire() {
        for dt in [
            DataType::Trigger,
            DataType::Boolean,
            DataType::Numeric,
            DataType::String,
            DataType::Json,
            DataType::Undef,
        ] {
            assert_eq!(DataType::from_wire(dt.to_wire()), Some(dt));
        }
        assert_eq!(DataType::from_wire(b'x'), None);
    }
}
