use bytes::{BufMut, BytesMut};

use super::{consts, crc::Crc16};


struct ByteEscape<B: BufMut> {
    buf: B,
}

impl<B: BufMut> ByteEscape<B> {
    fn new(buf: B) -> Self {
        Self { buf }
    }

    fn put_u8(&mut self, byte: u8) {
        match byte {
            consts::flags::ESCAPE | consts::flags::FRAME => self.buf.put_slice(&[
                consts::flags::ESCAPE,
                consts::escape::MASK ^ byte
            ]),
            _ => self.buf.put_u8(byte),
        }
    }

    fn put_frame_flag(&mut self) {
        self.buf.put_u8(consts::flags::FRAME)
    }
}

impl ByteEscape<&mut BytesMut> {
    fn reserve(&mut self, additional: usize) -> &mut Self {
        self.buf.reserve(additional);
        self
    }
}


struct Encoder<B: BufMut> {
    buf: ByteEscape<B>,
    crc: Crc16,
}

impl<B: BufMut> Encoder<B> {
    fn new(buf: B) -> Self {
        Self {
            buf: ByteEscape::new(buf),
            crc: Crc16::new(),
        }
    }

    fn flag(&mut self) -> &mut Self {
        self.buf.put_frame_flag();
        self
    }

    fn put_u8(&mut self, byte: u8) -> &mut Self {
        self.crc.put_u8(byte);
        self.buf.put_u8(byte);
        self
    }

    fn put_bytes<T: IntoIterator<Item = u8>>(&mut self, bytes: T) -> &mut Self {
        for b in bytes.into_iter() {
            self.put_u8(b);
        }
        self
    }

    /// Append the running CRC (MSB first, escaped like any payload byte) and
    /// the closing flag.
    fn finalize(&mut self) {
        self.put_bytes(self.crc.value().to_be_bytes());
        self.flag();
    }
}

impl Encoder<&mut BytesMut> {
    fn reserve(&mut self, additional: usize) -> &mut Self {
        self.buf.reserve(additional);
        self
    }
}


pub fn encode(buf: &mut BytesMut, packet: &[u8]) {
    Encoder::new(buf)
        .reserve(packet.len() + consts::OVERHEAD)   // reserve at least data-size + overhead
        .flag()                                     // flag
        .put_bytes(packet.iter().copied())          // payload
        .reserve(consts::OVERHEAD - 1)              // reserve CRC16 + flag
        .finalize()                                 // checksum and flag
}

pub fn encode_bytes(packet: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    encode(&mut buf, packet);
    buf
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::hdlc::decoder::Decoder;

    #[test]
    fn test_escape_bytes() {
        fn e(src: &[u8]) -> Vec<u8> {
            let mut dst = Vec::new();
            let mut buf = ByteEscape::new(&mut dst);

            for byte in src {
                buf.put_u8(*byte);
            }

            dst
        }

        assert_eq!(e(&[0x00, 0x00]), [0x00, 0x00]);
        assert_eq!(e(&[0x7D]), [0x7D, 0x5D]);
        assert_eq!(e(&[0x7E]), [0x7D, 0x5E]);
        assert_eq!(e(&[0x01, 0x7D, 0x02]), [0x01, 0x7D, 0x5D, 0x02]);
        assert_eq!(e(&[0x01, 0x7E, 0x02]), [0x01, 0x7D, 0x5E, 0x02]);
        assert_eq!(e(&[0x7D, 0x7E]), [0x7D, 0x5D, 0x7D, 0x5E]);
        assert_eq!(e(&[0x7F, 0x5D, 0x7E]), [0x7F, 0x5D, 0x7D, 0x5E]);
    }

    #[test]
    fn test_encode() {
        assert_eq!([
            0x7E, 0xFF, 0xFF, 0x7E,
        ], &encode_bytes(&[])[..]);

        assert_eq!([
            0x7E, 0x01, 0x02, 0x03, 0xAD, 0xAD, 0x7E,
        ], &encode_bytes(&[0x01, 0x02, 0x03])[..]);

        assert_eq!([
            0x7E, 0x05, 0x06, 0x07, 0x7D, 0x5D, 0x7D, 0x5E, 0x7F, 0xFF,
            0xDC, 0x31, 0x7E,
        ], &encode_bytes(&[0x05, 0x06, 0x07, 0x7D, 0x7E, 0x7F, 0xFF])[..]);
    }

    #[test]
    fn test_roundtrip() {
        // includes flag and escape values in the payload and in the CRC
        let payloads: &[&[u8]] = &[
            b"",
            b"PN\x00\x00T1541112861.0,P/a/b,D123",
            &[0x7E; 32],
            &[0x7D; 32],
            &[0x00, 0x7D, 0x7E, 0x20, 0x5D, 0x5E, 0xFF],
        ];

        for payload in payloads {
            let mut frame = encode_bytes(payload);
            let mut dec = Decoder::new();
            let packet = dec
                .process(&mut frame)
                .unwrap()
                .expect("frame incomplete");
            assert_eq!(&packet[..], *payload);
        }
    }

    #[test]
    fn test_roundtrip_all_single_bytes() {
        let mut dec = Decoder::new();
        for b in 0..=255u8 {
            let mut frame = encode_bytes(&[b]);
            let packet = dec
                .process(&mut frame)
                .unwrap()
                .expect("frame incomplete");
            assert_eq!(&packet[..], &[b]);
        }
    }
}
