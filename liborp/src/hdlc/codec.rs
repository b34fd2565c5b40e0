use super::{decoder, encoder};

use bytes::{Bytes, BytesMut};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;


/// HDLC frame codec for use with [`tokio_util::codec::Framed`].
///
/// Encoded items are raw packet payloads; decoded items are the verified,
/// unescaped payloads with the CRC trailer stripped. Framing-level errors are
/// logged and swallowed so a corrupt frame does not terminate the stream.
#[derive(Debug, Default)]
pub struct Codec {
    dec: decoder::Decoder,
}

impl Codec {
    pub fn new() -> Self {
        Self { dec: decoder::Decoder::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { dec: decoder::Decoder::with_capacity(cap) }
    }

    pub fn wrap<T>(self, io: T) -> Framed<T, Codec>
    where
        T: AsyncRead + AsyncWrite,
    {
        Framed::with_capacity(io, self, 4096)
    }
}

impl tokio_util::codec::Encoder<Bytes> for Codec {
    type Error = std::io::Error;

    fn encode(&mut self, packet: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encoder::encode(dst, &packet);
        Ok(())
    }
}

impl tokio_util::codec::Decoder for Codec {
    type Item = BytesMut;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.dec.process(src) {
                Ok(x) => return Ok(x),
                Err(e) => {
                    // recover locally and hunt for the next delimiter
                    log::warn!("error decoding frame: {e}");
                },
            }
        }
    }
}
