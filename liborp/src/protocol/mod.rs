//! ORP packet encoding and decoding: the typed message structure, the closed
//! packet-type and status sets, and the ASCII wire codec.

pub mod codec;
pub mod message;
pub mod status;
pub mod types;

pub use codec::Codec;
pub use message::{Message, MessageView};
pub use status::Status;
pub use types::{DataType, FileEvent, PacketType, ProtocolVersion};
