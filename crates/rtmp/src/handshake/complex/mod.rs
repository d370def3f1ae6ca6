//! Complex (Adobe) handshake.
//!
//! There is no official specification; the layout is community knowledge:
//! C1/S1 hide an HMAC-SHA256 digest inside one of two 764-byte blocks, and
//! S2 carries a digest keyed off the C1 digest.

use std::io::{self, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use digest::DigestProcessor;
use freshet_bytes_util::BytesCursorExt;
use rand::Rng;

use super::{RTMP_HANDSHAKE_SIZE, RtmpVersion, ServerHandshakeState, TIME_VERSION_LENGTH};
use crate::clock::SharedClock;
use crate::error::{HandshakeError, RtmpError};

pub mod digest;
pub mod error;

/// The version the server advertises in S1; the value the reference
/// implementation uses.
pub const RTMP_SERVER_VERSION: u32 = 0x04050001;

/// The digest length: everything around it is random padding, the digest
/// itself is always 32 bytes.
pub const RTMP_DIGEST_LENGTH: usize = 32;

/// The first half of the server key, used to generate S1 digests.
pub const RTMP_SERVER_KEY_FIRST_HALF: &[u8] = b"Genuine Adobe Flash Media Server 001";

/// The first half of the client key, used to verify C1 digests.
pub const RTMP_CLIENT_KEY_FIRST_HALF: &[u8] = b"Genuine Adobe Flash Player 001";

/// The full server key, used to derive the S2 digest key.
pub const RTMP_SERVER_KEY: &[u8] = &[
    0x47, 0x65, 0x6e, 0x75, 0x69, 0x6e, 0x65, 0x20, 0x41, 0x64, 0x6f, 0x62, 0x65, 0x20, 0x46, 0x6c, 0x61, 0x73, 0x68, 0x20,
    0x4d, 0x65, 0x64, 0x69, 0x61, 0x20, 0x53, 0x65, 0x72, 0x76, 0x65, 0x72, 0x20, 0x30, 0x30, 0x31, 0xf0, 0xee, 0xc2, 0x4a,
    0x80, 0x68, 0xbe, 0xe8, 0x2e, 0x00, 0xd0, 0xd1, 0x02, 0x9e, 0x7e, 0x57, 0x6e, 0xec, 0x5d, 0x2d, 0x29, 0x80, 0x6f, 0xab,
    0x93, 0xb8, 0xe6, 0x36, 0xcf, 0xeb, 0x31, 0xae,
];

/// The schema version.
///
/// C1/S1 are split into two 764-byte blocks after the 8 time/version bytes.
/// Schema 0 places the digest block second (offset 772), schema 1 places it
/// first (offset 8). The client picks; the server mirrors the client.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SchemaVersion {
    /// Digest block at offset 772.
    Schema0,
    /// Digest block at offset 8.
    Schema1,
}

/// Complex handshake server.
pub struct ComplexHandshakeServer {
    clock: SharedClock,
    requested_version: RtmpVersion,
    state: ServerHandshakeState,
    schema_version: SchemaVersion,
    c1_digest: Bytes,
    c1_timestamp: u32,
    c1_version: u32,
}

impl ComplexHandshakeServer {
    /// Creates a handshake server stamping times with the given clock.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: ServerHandshakeState::ReadC0C1,
            c1_digest: Bytes::default(),
            c1_timestamp: 0,
            requested_version: RtmpVersion(0),
            c1_version: 0,
            schema_version: SchemaVersion::Schema0,
        }
    }

    pub(crate) fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    /// Returns true if the handshake is finished.
    pub fn is_finished(&self) -> bool {
        self.state == ServerHandshakeState::Finish
    }

    /// Performs the complex handshake.
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
        self.requested_version = RtmpVersion(input.read_u8()?);

        if self.requested_version != RtmpVersion::Version3 {
            return Err(RtmpError::Handshake(HandshakeError::UnsupportedVersion(
                self.requested_version.0,
            )));
        }

        Ok(())
    }

    fn read_c1(&mut self, input: &mut io::Cursor<Bytes>) -> Result<(), RtmpError> {
        let c1_bytes = input.extract_bytes(RTMP_HANDSHAKE_SIZE)?;

        // The first 4 bytes of C1 are the timestamp.
        self.c1_timestamp = (&c1_bytes[0..4]).read_u32::<BigEndian>()?;

        // The next 4 bytes are a version number; non-zero marks a complex C1.
        self.c1_version = (&c1_bytes[4..8]).read_u32::<BigEndian>()?;

        // The following 764-byte blocks hold the digest and the key.
        let data_digest = DigestProcessor::new(c1_bytes, RTMP_CLIENT_KEY_FIRST_HALF);

        let (c1_digest_data, schema_version) = data_digest.read_digest()?;

        self.c1_digest = c1_digest_data;
        self.schema_version = schema_version;

        Ok(())
    }

    fn read_c2(&mut self, input: &mut io::Cursor<Bytes>) -> Result<(), RtmpError> {
        // Nothing in C2 is load-bearing, read and discard.
        input.seek_relative(RTMP_HANDSHAKE_SIZE as i64)?;

        Ok(())
    }

    fn write_s0(&mut self, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        output.write_u8(RtmpVersion::Version3.0)?;

        Ok(())
    }

    fn write_s1(&self, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        let mut writer = BytesMut::new().writer();

        // The first 4 bytes of S1 are the timestamp.
        writer.write_u32::<BigEndian>(self.clock.now_ms())?;

        // The next 4 bytes are a version number.
        writer.write_u32::<BigEndian>(RTMP_SERVER_VERSION)?;

        // 1528 bytes of random data: 764 bytes for the digest block, 764
        // bytes for the key block.
        let mut rng = rand::rng();
        for _ in 0..RTMP_HANDSHAKE_SIZE - TIME_VERSION_LENGTH {
            writer.write_u8(rng.random())?;
        }

        // Fill the digest into the generated data, mirroring the client's
        // schema, and write the result out.
        let data_digest = DigestProcessor::new(writer.into_inner().freeze(), RTMP_SERVER_KEY_FIRST_HALF);
        data_digest.generate_and_fill_digest(self.schema_version)?.write_to(output)?;

        Ok(())
    }

    fn write_s2(&self, output: &mut Vec<u8>) -> Result<(), RtmpError> {
        let start = output.len();

        output.write_u32::<BigEndian>(self.clock.now_ms())?;
        output.write_u32::<BigEndian>(self.c1_timestamp)?;

        let mut rng = rand::rng();
        for _ in 0..RTMP_HANDSHAKE_SIZE - RTMP_DIGEST_LENGTH - TIME_VERSION_LENGTH {
            output.write_u8(rng.random())?;
        }

        // The key for the S2 digest is itself a digest of the C1 digest.
        let key_digest = DigestProcessor::new(Bytes::new(), RTMP_SERVER_KEY);
        let key = key_digest.make_digest(&self.c1_digest, &[])?;

        // The digest covers the first 1504 bytes of S2 and fills the rest.
        let data_digest = DigestProcessor::new(Bytes::new(), &key);
        let digest = data_digest.make_digest(&output[start..start + RTMP_HANDSHAKE_SIZE - RTMP_DIGEST_LENGTH], &[])?;

        output.write_all(&digest)?;

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;
    use crate::clock::default_clock;
    use crate::handshake::HandshakeServer;

    #[test]
    fn complex_handshake() {
        let mut handshake_server = HandshakeServer::new(default_clock());

        let mut writer = Vec::with_capacity(3073);
        writer.write_u8(3).unwrap(); // version

        let mut c0c1 = Vec::with_capacity(RTMP_HANDSHAKE_SIZE);
        c0c1.write_u32::<BigEndian>(123).unwrap(); // timestamp
        c0c1.write_u32::<BigEndian>(100).unwrap(); // client version

        for i in 0..1528usize {
            c0c1.write_u8((i % 256) as u8).unwrap();
        }

        let data_digest = DigestProcessor::new(Bytes::from(c0c1), RTMP_CLIENT_KEY_FIRST_HALF);
        let result = data_digest.generate_and_fill_digest(SchemaVersion::Schema1).unwrap();
        result.write_to(&mut writer).unwrap();

        let mut bytes = Vec::new();
        handshake_server
            .handshake(&mut io::Cursor::new(Bytes::from(writer)), &mut bytes)
            .unwrap();

        // The server must stay in complex mode for a valid digest.
        assert!(matches!(handshake_server, HandshakeServer::Complex(_)));

        let s0 = &bytes[0..1];
        let s1 = &bytes[1..1537];
        let s2 = &bytes[1537..3073];

        assert_eq!(s0[0], 3);
        assert_eq!((&s1[4..8]).read_u32::<BigEndian>().unwrap(), RTMP_SERVER_VERSION);

        // S1 must carry a valid digest with the client's schema.
        let data_digest = DigestProcessor::new(Bytes::copy_from_slice(s1), RTMP_SERVER_KEY_FIRST_HALF);
        let (s1_digest, schema) = data_digest.read_digest().unwrap();
        assert_eq!(schema, SchemaVersion::Schema1);
        assert_eq!(s1_digest.len(), RTMP_DIGEST_LENGTH);

        // S2 ends with a digest over its first 1504 bytes, keyed by the C1
        // digest.
        assert_eq!((&s2[4..8]).read_u32::<BigEndian>().unwrap(), 123);

        let key_digest = DigestProcessor::new(Bytes::new(), RTMP_SERVER_KEY);
        let c1 = {
            let mut c1 = Vec::with_capacity(RTMP_HANDSHAKE_SIZE);
            c1.write_u32::<BigEndian>(123).unwrap();
            c1.write_u32::<BigEndian>(100).unwrap();
            for i in 0..1528usize {
                c1.write_u8((i % 256) as u8).unwrap();
            }
            let processor = DigestProcessor::new(Bytes::from(c1), RTMP_CLIENT_KEY_FIRST_HALF);
            let result = processor.generate_and_fill_digest(SchemaVersion::Schema1).unwrap();
            let mut out = Vec::new();
            result.write_to(&mut out).unwrap();
            Bytes::from(out)
        };

        let c1_processor = DigestProcessor::new(c1, RTMP_CLIENT_KEY_FIRST_HALF);
        let (c1_digest, _) = c1_processor.read_digest().unwrap();

        let key = key_digest.make_digest(&c1_digest, &[]).unwrap();
        let s2_processor = DigestProcessor::new(Bytes::new(), &key);
        assert_eq!(
            s2_processor.make_digest(&s2[..1504], &[]).unwrap(),
            &s2[1504..]
        );
    }

    #[test]
    fn simple_c1_falls_back() {
        let mut handshake_server = HandshakeServer::new(default_clock());

        let mut c0c1 = vec![3u8];
        c0c1.extend_from_slice(&[0; RTMP_HANDSHAKE_SIZE]);

        let mut output = Vec::new();
        handshake_server
            .handshake(&mut io::Cursor::new(Bytes::from(c0c1)), &mut output)
            .unwrap();

        assert!(matches!(handshake_server, HandshakeServer::Simple(_)));
        assert_eq!(output.len(), 1 + 2 * RTMP_HANDSHAKE_SIZE);
    }
}
