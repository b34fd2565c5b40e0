//! AT command framing: wraps an ORP packet in an `AT+ORP="…"` command line.
//!
//! Used when the transport is an AT-command modem channel instead of a raw
//! serial stream; mutually exclusive with HDLC within a session. There is no
//! CRC and no escaping, and inbound bytes are passed through verbatim (the
//! modem replies in plain text).

use bytes::{Buf, Bytes, BytesMut, BufMut};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;


pub const PREFIX: &[u8] = b"AT+ORP=\"";
pub const SUFFIX: &[u8] = b"\"\n";

/// Wrap a packet into an AT command.
///
/// The sequence number bytes are fixed to ASCII `"00"` in AT mode, and a zero
/// second byte is substituted with `'0'` to keep the command printable.
/// `packet` must hold at least the four fixed header bytes.
pub fn pack(dst: &mut BytesMut, packet: &[u8]) {
    dst.reserve(PREFIX.len() + packet.len() + SUFFIX.len());

    dst.put_slice(PREFIX);
    dst.put_u8(packet[0]);
    dst.put_u8(if packet[1] != 0 { packet[1] } else { b'0' });
    dst.put_slice(b"00");
    dst.put_slice(&packet[4..]);
    dst.put_slice(SUFFIX);
}

pub fn pack_bytes(packet: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    pack(&mut buf, packet);
    buf
}


/// Pass-through codec for AT transports.
///
/// Encoding wraps packets via [`pack`]; decoding hands inbound bytes to the
/// caller verbatim, one chunk per read.
#[derive(Debug, Default)]
pub struct Codec {}

impl Codec {
    pub fn new() -> Self {
        Self {}
    }

    pub fn wrap<T>(self, io: T) -> Framed<T, Codec>
    where
        T: AsyncRead + AsyncWrite,
    {
        Framed::new(io, self)
    }
}

impl tokio_util::codec::Encoder<Bytes> for Codec {
    type Error = std::io::Error;

    fn encode(&mut self, packet: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if packet.len() < 4 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("packet of length {} is too short to frame", packet.len()),
            ));
        }

        pack(dst, &packet);
        Ok(())
    }
}

impl tokio_util::codec::Decoder for Codec {
    type Item = BytesMut;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let chunk = src.split_to(src.remaining());
        Ok(Some(chunk))
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pack() {
        // get request for /a/b with sequence number 0x0102
        let packet = b"G \x02\x01P/a/b";
        assert_eq!(&pack_bytes(packet)[..], b"AT+ORP=\"G 00P/a/b\"\n");
    }

    #[test]
    fn test_pack_zero_byte1() {
        let packet = b"G\x00\x00\x00P/a/b";
        assert_eq!(&pack_bytes(packet)[..], b"AT+ORP=\"G000P/a/b\"\n");
    }
}
