//! RTMP handshake.
//!
//! Both endpoints exchange a version byte and two 1536-byte packets:
//!
//! ```text
//! Client -> C0 C1 -> Server
//! Client <- S0 S1 S2 <- Server
//! Client -> C2 -> Server
//! ```
//!
//! The simple form fills C1/S1 with random bytes; the complex (Adobe) form
//! hides an HMAC-SHA256 digest inside them. This library emits the simple
//! form and accepts either: the server tries the complex digest first and
//! falls back, the client never verifies the server digest.

use nutype_enum::nutype_enum;

use crate::clock::SharedClock;

pub mod complex;
pub mod simple;

pub use complex::ComplexHandshakeServer;
pub use simple::{SimpleHandshakeClient, SimpleHandshakeServer};

/// The size of C1/S1/C2/S2 in bytes.
pub const RTMP_HANDSHAKE_SIZE: usize = 1536;

/// The combined size of the time and version fields at the start of C1/S1.
pub const TIME_VERSION_LENGTH: usize = 8;

nutype_enum! {
    /// The RTMP version carried by C0/S0.
    pub enum RtmpVersion(u8) {
        /// RTMP version 3, the only one in use.
        Version3 = 3,
    }
}

/// The steps of the server side of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHandshakeState {
    /// Waiting for C0 and C1.
    ReadC0C1,
    /// Waiting for C2.
    ReadC2,
    /// Handshake complete.
    Finish,
}

/// The steps of the client side of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientHandshakeState {
    /// C0 and C1 not sent yet.
    WriteC0C1,
    /// Waiting for S0, S1 and S2.
    ReadS0S1S2,
    /// Handshake complete.
    Finish,
}

/// Server handshake, accepting the simple and the complex form.
///
/// Starts in complex mode; when the peer's C1 carries no valid digest the
/// packet is re-read in simple mode.
pub enum HandshakeServer {
    /// Simple handshake.
    Simple(SimpleHandshakeServer),
    /// Complex handshake.
    Complex(ComplexHandshakeServer),
}

impl HandshakeServer {
    /// Creates a handshake server stamping times with the given clock.
    pub fn new(clock: SharedClock) -> Self {
        Self::Complex(ComplexHandshakeServer::new(clock))
    }

    /// Returns true if the handshake is finished.
    pub fn is_finished(&self) -> bool {
        match self {
            HandshakeServer::Simple(handshaker) => handshaker.is_finished(),
            HandshakeServer::Complex(handshaker) => handshaker.is_finished(),
        }
    }

    /// Performs the handshake, reading peer bytes from the input and
    /// appending response bytes to the output.
    pub fn handshake(
        &mut self,
        input: &mut std::io::Cursor<bytes::Bytes>,
        output: &mut Vec<u8>,
    ) -> Result<(), crate::error::RtmpError> {
        match self {
            HandshakeServer::Complex(handshaker) => {
                // We need to be able to go back if the handshake isn't complex.
                let position = input.position();

                let result = handshaker.handshake(input, output);
                if result.is_err() {
                    // Complex handshake failed, switch to simple handshake.
                    let mut simple = SimpleHandshakeServer::new(handshaker.clock());

                    // Seek back to the position where we started.
                    input.set_position(position);

                    simple.handshake(input, output)?;

                    *self = HandshakeServer::Simple(simple);
                }
            }
            HandshakeServer::Simple(handshaker) => {
                handshaker.handshake(input, output)?;
            }
        }

        Ok(())
    }
}
