//! Simple handshake, RTMP spec 1.0 - 5.2.

use std::io::{self, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use freshet_bytes_util::BytesCursorExt;
use rand::Rng;

use super::{ClientHandshakeState, RTMP_HANDSHAKE_SIZE, RtmpVersion, ServerHandshakeState, TIME_VERSION_LENGTH};
use crate::clock::SharedClock;
use crate::error::{HandshakeError, RtmpError};

/// Simple handshake server.
pub struct SimpleHandshakeServer {
    clock: SharedClock,
    requested_version: RtmpVersion,
    state: ServerHandshakeState,
    c1_bytes: Bytes,
    c1_timestamp: u32,
}

impl SimpleHandshakeServer {
    /// Creates a handshake server stamping times with the given clock.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: ServerHandshakeState::ReadC0C1,
            c1_bytes: Bytes::new(),
            c1_timestamp: 0,
            requested_version: RtmpVersion(0),
        }
    }

    /// Returns true if the handshake is finished.
    pub fn is_finished(&self) -> bool {
        self.state == ServerHandshakeState::Finish
    }

    /// Performs the handshake, writing to the output and reading from the input.
    pub fn handshake(&mut self, input: &mut io::Cursor<Bytes>, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        match self.state {
            ServerHandshakeState::ReadC0C1 => {
                self.read_c0(input)?;
                self.read_c1(input)?;
                self.write_s0(output)?;
                self.write_s1(output)?;
                self.write_s2(output)?;
                self.state = ServerHandshakeState::ReadC2;
            }
            ServerHandshakeState::ReadC2 => {
                self.read_c2(input)?;
                self.state = ServerHandshakeState::Finish;
            }
            ServerHandshakeState::Finish => {}
        }

        Ok(())
    }

    fn read_c0(&mut self, input: &mut io::Cursor<Bytes>) -> Result<(), RtmpError> {
        // In C0, this field identifies the RTMP version requested by the client.
        self.requested_version = RtmpVersion(input.read_u8()?);

        // Only the plaintext version 3 is supported; 6 would mean an
        // encrypted handshake.
        if self.requested_version != RtmpVersion::Version3 {
            return Err(RtmpError::Handshake(HandshakeError::UnsupportedVersion(
                self.requested_version.0,
            )));
        }

        Ok(())
    }

    fn read_c1(&mut self, input: &mut io::Cursor<Bytes>) -> Result<(), RtmpError> {
        // Time (4 bytes): the epoch for all future chunks sent from this
        // endpoint. May be 0 or any arbitrary value.
        self.c1_timestamp = input.read_u32::<BigEndian>()?;

        // Zero (4 bytes): this field MUST be all 0s, but peers disagree and
        // the complex handshake reuses it, so it is not enforced here.
        input.read_u32::<BigEndian>()?;

        // Random data (1528 bytes): no need for cryptographically-secure
        // randomness, the peer only echoes it back.
        self.c1_bytes = input.extract_bytes(RTMP_HANDSHAKE_SIZE - TIME_VERSION_LENGTH)?;

        Ok(())
    }

    fn read_c2(&mut self, input: &mut io::Cursor<Bytes>) -> Result<(), RtmpError> {
        // C2 should echo S1, but some clients send different data; nothing
        // here is load-bearing, so it is read and discarded.
        input.seek_relative(RTMP_HANDSHAKE_SIZE as i64)?;

        Ok(())
    }

    /// Defined in RTMP Specification 1.0 - 5.2.2
    fn write_s0(&mut self, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        output.write_u8(RtmpVersion::Version3.0)?;

        Ok(())
    }

    /// Defined in RTMP Specification 1.0 - 5.2.3
    fn write_s1(&mut self, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        output.write_u32::<BigEndian>(self.clock.now_ms())?;

        // Zero (4 bytes): this field MUST be all 0s.
        output.write_u32::<BigEndian>(0)?;

        let mut rng = rand::rng();
        for _ in 0..RTMP_HANDSHAKE_SIZE - TIME_VERSION_LENGTH {
            output.write_u8(rng.random())?;
        }

        Ok(())
    }

    fn write_s2(&mut self, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        // Time (4 bytes): the timestamp sent in C1.
        output.write_u32::<BigEndian>(self.c1_timestamp)?;

        // Time2 (4 bytes): the timestamp at which C1 was read.
        output.write_u32::<BigEndian>(self.clock.now_ms())?;

        // Random echo (1528 bytes): the random data field sent in C1.
        output.write_all(&self.c1_bytes[..])?;

        Ok(())
    }
}

/// Simple handshake client.
pub struct SimpleHandshakeClient {
    clock: SharedClock,
    state: ClientHandshakeState,
    c1_timestamp: u32,
    c1_random: Vec<u8>,
}

impl SimpleHandshakeClient {
    /// Creates a handshake client stamping times with the given clock.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: ClientHandshakeState::WriteC0C1,
            c1_timestamp: 0,
            c1_random: Vec::new(),
        }
    }

    /// Returns true if the handshake is finished.
    pub fn is_finished(&self) -> bool {
        self.state == ClientHandshakeState::Finish
    }

    /// Performs the handshake, writing to the output and reading from the
    /// input.
    ///
    /// The first call consumes no input and produces C0 and C1; once S0, S1
    /// and S2 are available in the input, the second call verifies them and
    /// produces C2.
    pub fn handshake(&mut self, input: &mut io::Cursor<Bytes>, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        match self.state {
            ClientHandshakeState::WriteC0C1 => {
                self.write_c0(output)?;
                self.write_c1(output)?;
                self.state = ClientHandshakeState::ReadS0S1S2;
            }
            ClientHandshakeState::ReadS0S1S2 => {
                self.read_s0(input)?;
                self.read_s1_write_c2(input, output)?;
                self.read_s2(input)?;
                self.state = ClientHandshakeState::Finish;
            }
            ClientHandshakeState::Finish => {}
        }

        Ok(())
    }

    fn write_c0(&mut self, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        output.write_u8(RtmpVersion::Version3.0)?;

        Ok(())
    }

    fn write_c1(&mut self, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        self.c1_timestamp = self.clock.now_ms();
        output.write_u32::<BigEndian>(self.c1_timestamp)?;

        // Zero (4 bytes): all 0s marks the simple handshake; a complex peer
        // would carry its version here.
        output.write_u32::<BigEndian>(0)?;

        let mut rng = rand::rng();
        self.c1_random.clear();
        self.c1_random.reserve(RTMP_HANDSHAKE_SIZE - TIME_VERSION_LENGTH);
        for _ in 0..RTMP_HANDSHAKE_SIZE - TIME_VERSION_LENGTH {
            self.c1_random.push(rng.random());
        }

        output.write_all(&self.c1_random)?;

        Ok(())
    }

    fn read_s0(&mut self, input: &mut io::Cursor<Bytes>) -> Result<(), RtmpError> {
        let version = input.read_u8()?;

        if version != RtmpVersion::Version3.0 {
            return Err(RtmpError::Handshake(HandshakeError::UnsupportedVersion(version)));
        }

        Ok(())
    }

    /// Reads S1 and immediately writes C2: the S1 timestamp, the client's
    /// own C1 timestamp and the S1 random echo.
    ///
    /// The server may have answered with a complex S1; since C2 only echoes
    /// bytes, no digest verification is needed to interoperate.
    fn read_s1_write_c2(&mut self, input: &mut io::Cursor<Bytes>, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        let s1_timestamp = input.read_u32::<BigEndian>()?;
        // The zero field, or the server version for a complex handshake.
        input.read_u32::<BigEndian>()?;
        let s1_random = input.extract_bytes(RTMP_HANDSHAKE_SIZE - TIME_VERSION_LENGTH)?;

        output.write_u32::<BigEndian>(s1_timestamp)?;
        output.write_u32::<BigEndian>(self.c1_timestamp)?;
        output.write_all(&s1_random)?;

        Ok(())
    }

    fn read_s2(&mut self, input: &mut io::Cursor<Bytes>) -> Result<(), RtmpError> {
        // S2 echoes C1; peers routinely deviate, so nothing is verified.
        input.seek_relative(RTMP_HANDSHAKE_SIZE as i64)?;

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::clock::default_clock;

    #[test]
    fn client_server_handshake() {
        let mut client = SimpleHandshakeClient::new(default_clock());
        let mut server = crate::handshake::HandshakeServer::new(default_clock());

        // client writes C0 + C1
        let mut c0c1 = Vec::new();
        client.handshake(&mut io::Cursor::new(Bytes::new()), &mut c0c1).unwrap();
        assert_eq!(c0c1.len(), 1 + RTMP_HANDSHAKE_SIZE);
        assert_eq!(c0c1[0], 3);

        // server answers with S0 + S1 + S2
        let mut s0s1s2 = Vec::new();
        server
            .handshake(&mut io::Cursor::new(Bytes::from(c0c1.clone())), &mut s0s1s2)
            .unwrap();
        assert_eq!(s0s1s2.len(), 1 + 2 * RTMP_HANDSHAKE_SIZE);

        // S2 must echo the C1 random bytes
        assert_eq!(&s0s1s2[1 + RTMP_HANDSHAKE_SIZE + 8..], &c0c1[9..]);

        // client answers with C2
        let mut c2 = Vec::new();
        client
            .handshake(&mut io::Cursor::new(Bytes::from(s0s1s2.clone())), &mut c2)
            .unwrap();
        assert!(client.is_finished());
        assert_eq!(c2.len(), RTMP_HANDSHAKE_SIZE);

        // C2 must carry the S1 time, the C1 time and the S1 random echo
        assert_eq!(&c2[..4], &s0s1s2[1..5]);
        assert_eq!(&c2[4..8], &c0c1[1..5]);
        assert_eq!(&c2[8..], &s0s1s2[9..1 + RTMP_HANDSHAKE_SIZE]);

        // server consumes C2
        server
            .handshake(&mut io::Cursor::new(Bytes::from(c2)), &mut Vec::new())
            .unwrap();
        assert!(server.is_finished());
    }

    #[test]
    fn handshake_echo_fixture() {
        // C1 with time = 0, zero = 0 and a counting pattern
        let mut c0c1 = Vec::with_capacity(1 + RTMP_HANDSHAKE_SIZE);
        c0c1.write_u8(3).unwrap();
        c0c1.write_u32::<BigEndian>(0).unwrap();
        c0c1.write_u32::<BigEndian>(0).unwrap();
        for i in 0..1528usize {
            c0c1.write_u8((i & 0xFF) as u8).unwrap();
        }

        let mut server = crate::handshake::HandshakeServer::new(default_clock());
        let mut output = Vec::new();
        server
            .handshake(&mut io::Cursor::new(Bytes::from(c0c1.clone())), &mut output)
            .unwrap();

        let mut reader = io::Cursor::new(output);
        assert_eq!(reader.read_u8().unwrap(), 3);
        reader.read_u32::<BigEndian>().unwrap(); // S1 time
        assert_eq!(reader.read_u32::<BigEndian>().unwrap(), 0); // S1 zero

        let mut server_random = vec![0; 1528];
        reader.read_exact(&mut server_random).unwrap();

        // S2: our C1 time, the server's read time, then the byte-exact echo
        assert_eq!(reader.read_u32::<BigEndian>().unwrap(), 0);
        reader.read_u32::<BigEndian>().unwrap();

        let mut echo = vec![0; 1528];
        reader.read_exact(&mut echo).unwrap();
        assert_eq!(&echo, &c0c1[9..]);
    }

    #[test]
    fn rejects_encrypted_version() {
        let mut c0c1 = vec![6u8];
        c0c1.extend_from_slice(&[0; RTMP_HANDSHAKE_SIZE]);

        let mut server = SimpleHandshakeServer::new(default_clock());
        let err = server
            .handshake(&mut io::Cursor::new(Bytes::from(c0c1)), &mut Vec::new())
            .unwrap_err();

        assert!(matches!(
            err,
            RtmpError::Handshake(HandshakeError::UnsupportedVersion(6))
        ));
    }
}
