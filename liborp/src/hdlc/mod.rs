//! Simplified asynchronous HDLC framing: flag delimiters, byte escaping, and
//! a CRC-16/CCITT trailer. Address and control fields are not used.

pub mod codec;
pub mod consts;
pub mod crc;
pub mod decoder;
pub mod encoder;

pub use codec::Codec;
pub use decoder::Decoder;
