use bytes::{Buf, BufMut, BytesMut};

use super::consts;
use super::crc;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Escape byte followed by a flag or a second escape.
    InvalidEncoding,
    /// Computed CRC does not match the frame trailer.
    InvalidChecksum,
    /// Decoded payload exceeds the packet buffer capacity.
    BufferOverflow,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidEncoding => write!(f, "illegal escape sequence"),
            Error::InvalidChecksum => write!(f, "frame CRC mismatch"),
            Error::BufferOverflow => write!(f, "decoded packet too large"),
        }
    }
}

impl std::error::Error for Error {}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Hunting for the start-of-frame delimiter.
    Search,
    /// Delimiter seen, payload not yet started.
    SofFound,
    /// Receiving payload bytes.
    Data,
    /// Escape seen, next byte is transposed.
    Escaped,
}

/// Streaming deframer.
///
/// May be fed any number of bytes at a time; frames spanning arbitrary chunk
/// boundaries are reassembled across calls to [`process`](Self::process). On
/// error the state machine resets itself and hunts for the next delimiter, so
/// a corrupted frame never poisons the stream.
///
/// The final two unescaped bytes of a frame are its CRC trailer, but their
/// position is only known once the closing flag arrives. Incoming bytes are
/// therefore staged through a two-byte window: a byte is released to the
/// packet buffer and folded into the running CRC only after two newer bytes
/// exist. At end-of-frame the window holds the received CRC, MSB first.
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    state: State,
    window: [u8; 2],
    crc: u16,
    count: usize,
    limit: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(cap),
            state: State::Search,
            window: [0; 2],
            crc: crc::INIT,
            count: 0,
            limit: cap,
        }
    }

    /// Consume bytes from `src` until a frame completes, an error occurs, or
    /// `src` is exhausted. Consumed bytes (including the closing flag of a
    /// completed frame) are advanced past; unconsumed bytes are left for the
    /// next call.
    pub fn process(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, Error> {
        for (i, b) in src.iter().copied().enumerate() {
            match (self.state, b) {
                (State::Search, consts::flags::FRAME) => {
                    self.state = State::SofFound;
                },
                (State::Search, _) => {
                    // discard until start-of-frame
                },

                (State::SofFound, consts::flags::FRAME) => {
                    // contiguous delimiter run
                },
                (State::SofFound, consts::flags::ESCAPE) => {
                    self.state = State::Escaped;
                },
                (State::SofFound, b) => {
                    self.state = State::Data;
                    self.push_byte(b);
                },

                (State::Data, consts::flags::FRAME) => {
                    src.advance(i + 1);
                    return self.complete().map(Some);
                },
                (State::Data, consts::flags::ESCAPE) => {
                    self.state = State::Escaped;
                },
                (State::Data, b) => {
                    self.push_byte(b);
                },

                (State::Escaped, consts::flags::FRAME | consts::flags::ESCAPE) => {
                    src.advance(i + 1);
                    self.reset();
                    return Err(Error::InvalidEncoding);
                },
                (State::Escaped, b) => {
                    self.state = State::Data;
                    self.push_byte(b ^ consts::escape::MASK);
                },
            }
        }

        src.advance(src.remaining());
        Ok(None)
    }

    /// Whether the decoder is between frames (the next byte fed in starts
    /// the hunt for a new delimiter).
    pub fn is_idle(&self) -> bool {
        self.state == State::Search
    }

    fn push_byte(&mut self, byte: u8) {
        // Release the oldest windowed byte; the two newest may be the CRC.
        if self.count > 1 {
            let out = self.window[1];
            self.crc = crc::update(self.crc, out);
            if self.buf.len() < self.limit {
                self.buf.put_u8(out);
            }
        }
        self.window[1] = self.window[0];
        self.window[0] = byte;
        self.count += 1;
    }

    fn complete(&mut self) -> Result<BytesMut, Error> {
        if self.count < 2 {
            self.reset();
            return Err(Error::InvalidChecksum);
        }
        if self.count - 2 > self.limit {
            self.reset();
            return Err(Error::BufferOverflow);
        }

        let received = u16::from_be_bytes([self.window[1], self.window[0]]);
        if received != self.crc {
            log::debug!(
                "CRC mismatch: calculated {:04X}, received {:04X}",
                self.crc,
                received
            );
            self.reset();
            return Err(Error::InvalidChecksum);
        }

        let packet = self.buf.split();
        self.reset();
        Ok(packet)
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.state = State::Search;
        self.window = [0; 2];
        self.crc = crc::INIT;
        self.count = 0;
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod test {
    use bytes::BufMut;

    use super::*;

    #[test]
    fn test_frame_decode() {
        let data = [
            0x7E, 0x01, 0x02, 0x03, 0xAD, 0xAD, 0x7E,
        ];

        let mut dec = Decoder::new();
        let mut buf = BytesMut::from(&data[..]);

        let packet = dec.process(&mut buf).unwrap().expect("frame incomplete");
        assert_eq!(&packet[..], &[0x01, 0x02, 0x03]);
        assert_eq!(buf.remaining(), 0);
        assert!(dec.is_idle());
    }

    #[test]
    fn test_frame_decode_escaped() {
        // payload 05 06 07 7D 7E 7F FF, CRC 0xDC31
        let data = [
            0x7E, 0x05, 0x06, 0x07, 0x7D, 0x5D, 0x7D, 0x5E, 0x7F, 0xFF,
            0xDC, 0x31, 0x7E,
        ];

        let mut dec = Decoder::new();
        let mut buf = BytesMut::from(&data[..]);

        let packet = dec.process(&mut buf).unwrap().expect("frame incomplete");
        assert_eq!(&packet[..], &[0x05, 0x06, 0x07, 0x7D, 0x7E, 0x7F, 0xFF]);
    }

    #[test]
    fn test_empty_payload() {
        // CRC of nothing is the initial value 0xFFFF
        let data = [0x7E, 0xFF, 0xFF, 0x7E];

        let mut dec = Decoder::new();
        let mut buf = BytesMut::from(&data[..]);

        let packet = dec.process(&mut buf).unwrap().expect("frame incomplete");
        assert_eq!(packet.len(), 0);
    }

    #[test]
    fn test_leading_noise_discarded() {
        let data = [
            0x41, 0x42, 0x43, 0x7E, 0x68, 0x69, 0x62, 0x03, 0x7E,
        ];

        let mut dec = Decoder::new();
        let mut buf = BytesMut::from(&data[..]);

        let packet = dec.process(&mut buf).unwrap().expect("frame incomplete");
        assert_eq!(&packet[..], b"hi");
    }

    #[test]
    fn test_contiguous_delimiters() {
        let data = [
            0x7E, 0x7E, 0x7E, 0x68, 0x69, 0x62, 0x03, 0x7E,
        ];

        let mut dec = Decoder::new();
        let mut buf = BytesMut::from(&data[..]);

        let packet = dec.process(&mut buf).unwrap().expect("frame incomplete");
        assert_eq!(&packet[..], b"hi");
    }

    #[test]
    fn test_chunked_single_bytes() {
        let data = [
            0x7E, 0x05, 0x06, 0x07, 0x7D, 0x5D, 0x7D, 0x5E, 0x7F, 0xFF,
            0xDC, 0x31, 0x7E,
        ];

        let mut dec = Decoder::new();
        let mut result = None;

        for (i, b) in data.iter().enumerate() {
            let mut buf = BytesMut::from(&[*b][..]);
            match dec.process(&mut buf).unwrap() {
                Some(packet) => {
                    assert_eq!(i, data.len() - 1);
                    result = Some(packet);
                },
                None => assert!(i < data.len() - 1),
            }
            assert_eq!(buf.remaining(), 0);
        }

        let packet = result.expect("frame incomplete");
        assert_eq!(&packet[..], &[0x05, 0x06, 0x07, 0x7D, 0x7E, 0x7F, 0xFF]);
    }

    #[test]
    fn test_crc_error_then_recovery() {
        let good = [0x7E, 0x01, 0x02, 0x03, 0xAD, 0xAD, 0x7E];
        let mut corrupt = good;
        corrupt[2] ^= 0x10;

        let mut buf = BytesMut::new();
        buf.put_slice(&corrupt);
        buf.put_slice(&good);

        let mut dec = Decoder::new();
        assert_eq!(dec.process(&mut buf), Err(Error::InvalidChecksum));

        let packet = dec.process(&mut buf).unwrap().expect("frame incomplete");
        assert_eq!(&packet[..], &[0x01, 0x02, 0x03]);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_framing_error() {
        // escape followed by a flag is illegal
        let data = [0x7E, 0x01, 0x7D, 0x7E];

        let mut dec = Decoder::new();
        let mut buf = BytesMut::from(&data[..]);

        assert_eq!(dec.process(&mut buf), Err(Error::InvalidEncoding));
        assert!(dec.is_idle());
    }

    #[test]
    fn test_double_escape_error() {
        let data = [0x7E, 0x01, 0x7D, 0x7D, 0x02, 0x7E];

        let mut dec = Decoder::new();
        let mut buf = BytesMut::from(&data[..]);

        assert_eq!(dec.process(&mut buf), Err(Error::InvalidEncoding));
    }

    #[test]
    fn test_buffer_overflow() {
        let mut dec = Decoder::with_capacity(4);

        let payload = [0x10, 0x11, 0x12, 0x13, 0x14, 0x15];
        let crc = crate::hdlc::crc::checksum(&payload);

        let mut buf = BytesMut::new();
        buf.put_u8(0x7E);
        buf.put_slice(&payload);
        buf.put_slice(&crc.to_be_bytes());
        buf.put_u8(0x7E);

        assert_eq!(dec.process(&mut buf), Err(Error::BufferOverflow));
    }
}
