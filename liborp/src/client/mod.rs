//! Client send/receive pipeline.
//!
//! A [`Session`] owns all per-connection state: the framed transport, the
//! packet codec, and the file-transfer helper. Outbound messages are encoded
//! and framed into the transport; inbound bytes are deframed, decoded, and
//! surfaced as [`Event`]s. Framing and decode errors are logged and the
//! stream continues, since the transport may be a flaky serial line.

pub mod file;

pub use file::FileTransfer;

use bytes::{Bytes, BytesMut};

use futures::{SinkExt, StreamExt};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder as _, Encoder as _, Framed};

use crate::at;
use crate::hdlc;
use crate::protocol::codec::EncodeError;
use crate::protocol::message::{self, Message, MessageView};
use crate::protocol::{self, DataType, FileEvent, PacketType, ProtocolVersion, Status};


/// Preamble byte ignored by the HDLC deframer, written periodically to keep
/// USB-serial converters from suspending.
pub const KEEPALIVE: u8 = b'~';


#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Encode(EncodeError),
    /// Operation called with a packet type it does not support.
    BadParameter,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "transport error: {e}"),
            Error::Encode(e) => write!(f, "encode error: {e}"),
            Error::BadParameter => write!(f, "invalid parameter"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Encode(e) => Some(e),
            Error::BadParameter => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}


/// Frame layer selection; fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    #[default]
    Hdlc,
    At,
}

#[derive(Debug)]
enum FrameCodec {
    Hdlc(hdlc::Codec),
    At(at::Codec),
}

impl tokio_util::codec::Encoder<Bytes> for FrameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, packet: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match self {
            FrameCodec::Hdlc(codec) => codec.encode(packet, dst),
            FrameCodec::At(codec) => codec.encode(packet, dst),
        }
    }
}

impl tokio_util::codec::Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            FrameCodec::Hdlc(codec) => codec.decode(src),
            FrameCodec::At(codec) => codec.decode(src),
        }
    }
}


/// An inbound item surfaced by [`Session::recv`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A decoded message (HDLC framing).
    Message(Message),
    /// Verbatim transport bytes (AT framing is a pass-through on receive).
    Raw(Bytes),
}


/// A client session over one transport.
pub struct Session<T> {
    framed: Framed<T, FrameCodec>,
    framing: Framing,
    codec: protocol::Codec,
    file: FileTransfer,
    sequence: u16,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T, framing: Framing, version: ProtocolVersion) -> Self {
        let codec = match framing {
            Framing::Hdlc => {
                FrameCodec::Hdlc(hdlc::Codec::with_capacity(message::PACKET_LEN_MAX))
            },
            Framing::At => FrameCodec::At(at::Codec::new()),
        };

        Self {
            framed: Framed::with_capacity(io, codec, 4096),
            framing,
            codec: protocol::Codec::new(version),
            file: FileTransfer::new(),
            sequence: 0,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn version(&self) -> ProtocolVersion {
        self.codec.version()
    }

    pub fn file(&mut self) -> &mut FileTransfer {
        &mut self.file
    }

    /// Encode, frame, and transmit a message.
    ///
    /// The session stamps the sequence number (free-running, wraps at
    /// 16 bits). Returns the number of data bytes encoded, which may be less
    /// than `msg.data.len()` if the packet limit truncated the payload.
    pub async fn send(&mut self, msg: &mut Message) -> Result<usize, Error> {
        msg.sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        let mut packet = BytesMut::new();
        let encoded = self.codec.encode(msg, &mut packet, message::PACKET_LEN_MAX)?;
        if encoded < msg.data.len() {
            log::debug!(
                "data truncated: {encoded} of {} bytes encoded",
                msg.data.len()
            );
        }

        log::debug!("sending: {} ({} bytes)", msg.kind.name(), packet.len());
        self.framed.send(packet.freeze()).await?;

        Ok(encoded)
    }

    /// Receive the next inbound item.
    ///
    /// Returns `None` on end of stream. Frames that fail to decode are
    /// discarded with a log entry and reception continues. Inbound file-data
    /// requests are cached through the file-transfer helper and, in auto
    /// mode, acknowledged with an OK response before this returns.
    pub async fn recv(&mut self) -> Result<Option<Event>, Error> {
        loop {
            let Some(packet) = self.framed.next().await else {
                return Ok(None);
            };
            let packet = packet?;

            if self.framing == Framing::At {
                return Ok(Some(Event::Raw(packet.freeze())));
            }

            match self.codec.decode(&packet) {
                Ok(view) => {
                    let ack = self.ingest(&view);
                    let msg = view.to_message();

                    if ack {
                        self.respond(PacketType::FileDataResp, Status::Ok).await?;
                    }

                    return Ok(Some(Event::Message(msg)));
                },
                Err(e) => {
                    log::warn!("failed to decode packet ({} bytes): {e}", packet.len());
                },
            }
        }
    }

    /// Write the preamble byte to tickle the transport.
    pub async fn keepalive(&mut self) -> Result<(), Error> {
        let io = self.framed.get_mut();
        io.write_all(&[KEEPALIVE]).await?;
        io.flush().await?;
        Ok(())
    }

    // Whether the packet should be auto-acknowledged. Decided before caching
    // since the helper may drop out of auto mode on the final packet.
    fn ingest(&mut self, view: &MessageView<'_>) -> bool {
        if view.kind != PacketType::FileData || view.data.is_empty() {
            return false;
        }

        let ack = self.file.auto();
        self.file.cache(view.data);
        ack
    }

    /// Create an input or output resource in the Data Hub.
    pub async fn create_resource(
        &mut self,
        input: bool,
        path: &str,
        data_type: DataType,
        units: &str,
    ) -> Result<(), Error> {
        let kind = if input {
            PacketType::InputCreate
        } else {
            PacketType::OutputCreate
        };

        let mut msg = Message::new(kind);
        msg.path = path.to_owned();
        msg.data_type = data_type;
        msg.unit = units.to_owned();
        self.send(&mut msg).await?;
        Ok(())
    }

    /// Create a sensor in the Data Hub.
    pub async fn create_sensor(
        &mut self,
        path: &str,
        data_type: DataType,
        units: &str,
    ) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::SensorCreate);
        msg.path = path.to_owned();
        msg.data_type = data_type;
        msg.unit = units.to_owned();
        self.send(&mut msg).await?;
        Ok(())
    }

    pub async fn delete_resource(&mut self, path: &str) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::Delete);
        msg.path = path.to_owned();
        self.send(&mut msg).await?;
        Ok(())
    }

    pub async fn remove_sensor(&mut self, path: &str) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::SensorRemove);
        msg.path = path.to_owned();
        self.send(&mut msg).await?;
        Ok(())
    }

    /// Register for notifications on a resource.
    pub async fn add_push_handler(&mut self, path: &str) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::HandlerAdd);
        msg.path = path.to_owned();
        self.send(&mut msg).await?;
        Ok(())
    }

    pub async fn remove_push_handler(&mut self, path: &str) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::HandlerRemove);
        msg.path = path.to_owned();
        self.send(&mut msg).await?;
        Ok(())
    }

    /// Push a string-encoded data sample.
    pub async fn push(
        &mut self,
        path: &str,
        data_type: DataType,
        timestamp: Option<f64>,
        value: Option<&str>,
    ) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::Push);
        msg.path = path.to_owned();
        msg.data_type = data_type;
        msg.timestamp = timestamp;
        if let Some(value) = value {
            msg.data = value.as_bytes().to_vec();
        }
        self.send(&mut msg).await?;
        Ok(())
    }

    /// Request the current value of a resource.
    pub async fn get(&mut self, path: &str) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::Get);
        msg.path = path.to_owned();
        self.send(&mut msg).await?;
        Ok(())
    }

    /// Set the example value for a JSON-type input resource.
    pub async fn set_json_example(&mut self, path: &str, example: &str) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::ExampleSet);
        msg.path = path.to_owned();
        msg.data_type = DataType::Json;
        msg.data = example.as_bytes().to_vec();
        self.send(&mut msg).await?;
        Ok(())
    }

    /// Respond to a notification or unsolicited packet.
    ///
    /// Acknowledging file data with an OK commits any staged bytes to disk.
    pub async fn respond(&mut self, kind: PacketType, status: Status) -> Result<(), Error> {
        match kind {
            PacketType::HandlerCallResp
            | PacketType::SensorCallResp
            | PacketType::FileControlResp => {},

            PacketType::FileDataResp => {
                if status == Status::Ok {
                    self.file.flush();
                }
            },

            _ => return Err(Error::BadParameter),
        }

        let mut msg = Message::response(kind, status);
        self.send(&mut msg).await?;
        Ok(())
    }

    /// Send a sync packet.
    pub async fn sync(
        &mut self,
        kind: PacketType,
        version: ProtocolVersion,
        sent_count: Option<u32>,
        received_count: Option<u32>,
        mtu: Option<u32>,
    ) -> Result<(), Error> {
        if !kind.is_sync() {
            return Err(Error::BadParameter);
        }

        let mut msg = Message::new(kind);
        msg.version = version;
        msg.sent_count = sent_count;
        msg.received_count = received_count;
        msg.mtu = mtu;
        self.send(&mut msg).await?;
        Ok(())
    }

    /// Send a file-transfer control notification.
    pub async fn file_notify(
        &mut self,
        event: FileEvent,
        data: Option<&str>,
    ) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::FileControl);
        msg.event = event;
        if let Some(data) = data {
            msg.data = data.as_bytes().to_vec();
        }
        self.send(&mut msg).await?;
        Ok(())
    }

    /// Send outbound file-transfer data.
    pub async fn file_data(&mut self, data: &[u8]) -> Result<(), Error> {
        let mut msg = Message::new(PacketType::FileData);
        msg.data = data.to_vec();
        self.send(&mut msg).await?;
        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;

    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_send_push() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let mut session = Session::new(a, Framing::Hdlc, ProtocolVersion::V2);

        session
            .push("/a/b", DataType::Numeric, Some(1541112861.0), Some("123"))
            .await
            .unwrap();

        let mut peer = hdlc::Codec::new().wrap(b);
        let packet = peer.next().await.unwrap().unwrap();
        assert_eq!(&packet[..], b"PN\x00\x00T1541112861.0,P/a/b,D123");
    }

    #[tokio::test]
    async fn test_sequence_increments() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let mut session = Session::new(a, Framing::Hdlc, ProtocolVersion::V2);

        session.get("/a").await.unwrap();
        session.get("/a").await.unwrap();

        let mut peer = hdlc::Codec::new().wrap(b);
        let first = peer.next().await.unwrap().unwrap();
        let second = peer.next().await.unwrap().unwrap();
        assert_eq!(&first[2..4], &[0x00, 0x00]);
        assert_eq!(&second[2..4], &[0x01, 0x00]);
    }

    #[tokio::test]
    async fn test_recv_message() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let mut session = Session::new(a, Framing::Hdlc, ProtocolVersion::V2);
        let mut peer = hdlc::Codec::new().wrap(b);

        peer.send(Bytes::from_static(b"g\x41\x00\x00")).await.unwrap();

        let event = session.recv().await.unwrap().unwrap();
        let Event::Message(msg) = event else {
            panic!("expected message event");
        };
        assert_eq!(msg.kind, PacketType::GetResp);
        assert_eq!(msg.status, Status::NotFound);
    }

    #[tokio::test]
    async fn test_recv_skips_corrupt_frame() {
        let (a, mut b) = tokio::io::duplex(1 << 16);
        let mut session = Session::new(a, Framing::Hdlc, ProtocolVersion::V2);

        // valid frame for "p @ 0 0" is 7E 70 40 00 00 DB 18 7E
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0x7E, 0x60, 0x40, 0x00, 0x00, 0xDB, 0x18, 0x7E]);
        stream.extend_from_slice(&[0x7E, 0x70, 0x40, 0x00, 0x00, 0xDB, 0x18, 0x7E]);
        tokio::io::AsyncWriteExt::write_all(&mut b, &stream)
            .await
            .unwrap();

        let event = session.recv().await.unwrap().unwrap();
        let Event::Message(msg) = event else {
            panic!("expected message event");
        };
        assert_eq!(msg.kind, PacketType::PushResp);
        assert_eq!(msg.status, Status::Ok);
    }

    #[tokio::test]
    async fn test_recv_file_data_auto_ack() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let mut session = Session::new(a, Framing::Hdlc, ProtocolVersion::V2);
        let mut peer = hdlc::Codec::new().wrap(b);

        let path = std::env::temp_dir().join(format!("orp-session-{}", std::process::id()));
        session.file().setup(path.to_str().unwrap(), 0, true);

        peer.send(Bytes::from_static(b"T \x00\x00Dabc")).await.unwrap();

        let event = session.recv().await.unwrap().unwrap();
        let Event::Message(msg) = event else {
            panic!("expected message event");
        };
        assert_eq!(msg.kind, PacketType::FileData);
        assert_eq!(msg.data, b"abc");

        // auto mode acknowledged the packet with status OK
        let packet = peer.next().await.unwrap().unwrap();
        assert_eq!(&packet[..], b"t\x40\x00\x00");

        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_at_mode_send() {
        let (a, mut b) = tokio::io::duplex(1 << 16);
        let mut session = Session::new(a, Framing::At, ProtocolVersion::V1);

        session.get("/a/b").await.unwrap();

        let mut out = vec![0u8; 19];
        b.read_exact(&mut out).await.unwrap();
        assert_eq!(&out[..], b"AT+ORP=\"G 00P/a/b\"\n");
    }

    #[tokio::test]
    async fn test_at_mode_recv_passthrough() {
        let (a, mut b) = tokio::io::duplex(1 << 16);
        let mut session = Session::new(a, Framing::At, ProtocolVersion::V1);

        tokio::io::AsyncWriteExt::write_all(&mut b, b"OK\r\n")
            .await
            .unwrap();

        let event = session.recv().await.unwrap().unwrap();
        assert_eq!(event, Event::Raw(Bytes::from_static(b"OK\r\n")));
    }

    #[tokio::test]
    async fn test_keepalive() {
        let (a, mut b) = tokio::io::duplex(1 << 16);
        let mut session = Session::new(a, Framing::Hdlc, ProtocolVersion::V2);

        session.keepalive().await.unwrap();

        let mut out = [0u8; 1];
        b.read_exact(&mut out).await.unwrap();
        assert_eq!(out[0], b'~');
    }
}
