//! Client-side library for the Octave Resource Protocol (ORP) — the ASCII
//! request/response protocol spoken between a remote asset and an Octave edge
//! gateway over a serial byte stream.
//!
//! The stack is layered bottom-up: [`hdlc`] delimits and CRC-protects frames
//! on the wire (with [`at`] as an alternative wrapper for AT-command
//! transports), [`protocol`] encodes and decodes ORP packets, and [`client`]
//! glues both into a send/receive pipeline.

pub mod at;
pub mod client;
pub mod hdlc;
pub mod protocol;
