//! Response status codes and their wire encoding.

/// Base of the wire encoding: a status is transmitted as `0x40 - code`, so
/// `OK` is `'@'` and the negative codes map to the letters that follow it.
pub const WIRE_BASE: u8 = 0x40;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Ok = 0,
    NotFound = -1,
    /// Deprecated; retained for wire compatibility.
    NotPossible = -2,
    OutOfRange = -3,
    NoMemory = -4,
    NotPermitted = -5,
    Fault = -6,
    CommError = -7,
    Timeout = -8,
    Overflow = -9,
    Underflow = -10,
    WouldBlock = -11,
    Deadlock = -12,
    FormatError = -13,
    Duplicate = -14,
    BadParameter = -15,
    Closed = -16,
    Busy = -17,
    Unsupported = -18,
    IoError = -19,
    NotImplemented = -20,
    Unavailable = -21,
    Terminated = -22,
}

impl Status {
    pub fn description(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "Item does not exist or could not be found",
            Status::NotPossible => "Not possible to perform the requested action",
            Status::OutOfRange => "An index or other value is out of range",
            Status::NoMemory => "Insufficient memory is available",
            Status::NotPermitted => "Current user does not have permission to perform requested action",
            Status::Fault => "Unspecified internal error",
            Status::CommError => "Communications error",
            Status::Timeout => "A time-out occurred",
            Status::Overflow => "An overflow occurred or would have occurred",
            Status::Underflow => "An underflow occurred or would have occurred",
            Status::WouldBlock => "Would have blocked if non-blocking behaviour was not requested",
            Status::Deadlock => "Would have caused a deadlock",
            Status::FormatError => "Format error",
            Status::Duplicate => "Duplicate entry found or operation already performed",
            Status::BadParameter => "Parameter is invalid",
            Status::Closed => "The resource is closed",
            Status::Busy => "The resource is busy",
            Status::Unsupported => "The underlying resource does not support this operation",
            Status::IoError => "An IO operation failed",
            Status::NotImplemented => "Unimplemented functionality",
            Status::Unavailable => "A transient or temporary loss of a service or resource",
            Status::Terminated => "The process, operation, data stream, session, etc. has stopped",
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Status> {
        match code {
            0 => Some(Status::Ok),
            -1 => Some(Status::NotFound),
            -2 => Some(Status::NotPossible),
            -3 => Some(Status::OutOfRange),
            -4 => Some(Status::NoMemory),
            -5 => Some(Status::NotPermitted),
            -6 => Some(Status::Fault),
            -7 => Some(Status::CommError),
            -8 => Some(Status::Timeout),
            -9 => Some(Status::Overflow),
            -10 => Some(Status::Underflow),
            -11 => Some(Status::WouldBlock),
            -12 => Some(Status::Deadlock),
            -13 => Some(Status::FormatError),
            -14 => Some(Status::Duplicate),
            -15 => Some(Status::BadParameter),
            -16 => Some(Status::Closed),
            -17 => Some(Status::Busy),
            -18 => Some(Status::Unsupported),
            -19 => Some(Status::IoError),
            -20 => Some(Status::NotImplemented),
            -21 => Some(Status::Unavailable),
            -22 => Some(Status::Terminated),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        (WIRE_BASE as i32 - self.code()) as u8
    }

    pub fn from_wire(byte: u8) -> Option<Status> {
        Status::from_code(WIRE_BASE as i32 - byte as i32)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl From<Status> for i32 {
    fn from(value: Status) -> Self {
        value as _
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wire_roundtrip() {
        for code in -22..=0 {
            let status = Status::from_code(code).unwrap();
            assert_eq!(status.code(), code);
            assert_eq!(Status::from_wire(status.to_wire()), Some(status));
        }
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(Status::Ok.to_wire(), 0x40);
        assert_eq!(Status::NotFound.to_wire(), 0x41);
        assert_eq!(Status::Terminated.to_wire(), 0x56);
        assert_eq!(Status::from_wire(0x3F), None);
        assert_eq!(Status::from_wire(0x57), None);
    }
}
