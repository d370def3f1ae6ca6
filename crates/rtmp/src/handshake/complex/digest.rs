//! Digest processing for the complex handshake.

use std::io::{self, Write};

use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::ComplexHandshakeError;
use super::{RTMP_DIGEST_LENGTH, SchemaVersion, TIME_VERSION_LENGTH};
use crate::handshake::RTMP_HANDSHAKE_SIZE;

/// The length of one of the two C1/S1 blocks: (1536 - 8) / 2.
const CHUNK_LENGTH: usize = (RTMP_HANDSHAKE_SIZE - TIME_VERSION_LENGTH) / 2;

/// Locates, verifies and generates the HMAC-SHA256 digests hidden in
/// C1/S1 packets.
pub struct DigestProcessor<'a> {
    data: Bytes,
    key: &'a [u8],
}

/// A C1/S1 packet split around its digest, ready to be written out.
pub struct DigestResult {
    /// The bytes before the digest.
    pub left: Bytes,
    /// The 32-byte digest.
    pub digest: Bytes,
    /// The bytes after the digest.
    pub right: Bytes,
}

impl DigestResult {
    /// Writes the three parts in order.
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(&self.left)?;
        writer.write_all(&self.digest)?;
        writer.write_all(&self.right)?;

        Ok(())
    }
}

impl<'a> DigestProcessor<'a> {
    /// Creates a processor over a full C1/S1 packet (or an empty buffer when
    /// only [`make_digest`](Self::make_digest) is needed).
    pub fn new(data: Bytes, key: &'a [u8]) -> Self {
        Self { data, key }
    }

    /// The offset of the digest within the packet for the given schema.
    ///
    /// Each 764-byte block starts with 4 offset bytes; their sum modulo 728
    /// positions the digest within the 728 bytes that follow them.
    fn digest_offset(&self, schema: SchemaVersion) -> Result<usize, ComplexHandshakeError> {
        let block_start = match schema {
            SchemaVersion::Schema1 => TIME_VERSION_LENGTH,
            SchemaVersion::Schema0 => TIME_VERSION_LENGTH + CHUNK_LENGTH,
        };

        if self.data.len() < block_start + 4 {
            return Err(ComplexHandshakeError::NotEnoughData);
        }

        let offset_bytes = &self.data[block_start..block_start + 4];
        let offset = offset_bytes.iter().map(|b| *b as usize).sum::<usize>() % (CHUNK_LENGTH - RTMP_DIGEST_LENGTH - 4);

        Ok(block_start + 4 + offset)
    }

    /// Finds the digest in the packet, trying schema 0 then schema 1.
    ///
    /// Returns the digest bytes and the schema they were found with, or
    /// [`ComplexHandshakeError::UnknownSchema`] when neither matches (which
    /// is how a simple handshake packet presents).
    pub fn read_digest(&self) -> Result<(Bytes, SchemaVersion), ComplexHandshakeError> {
        for schema in [SchemaVersion::Schema0, SchemaVersion::Schema1] {
            let offset = self.digest_offset(schema)?;

            if self.data.len() < offset + RTMP_DIGEST_LENGTH {
                return Err(ComplexHandshakeError::NotEnoughData);
            }

            let digest = self.data.slice(offset..offset + RTMP_DIGEST_LENGTH);
            let computed = self.make_digest(&self.data[..offset], &self.data[offset + RTMP_DIGEST_LENGTH..])?;

            if digest == computed {
                return Ok((digest, schema));
            }
        }

        Err(ComplexHandshakeError::UnknownSchema)
    }

    /// Computes the digest over the packet with the digest bytes excised and
    /// returns the packet parts ready for writing.
    pub fn generate_and_fill_digest(&self, schema: SchemaVersion) -> Result<DigestResult, ComplexHandshakeError> {
        let offset = self.digest_offset(schema)?;

        if self.data.len() < offset + RTMP_DIGEST_LENGTH {
            return Err(ComplexHandshakeError::NotEnoughData);
        }

        let left = self.data.slice(..offset);
        let right = self.data.slice(offset + RTMP_DIGEST_LENGTH..);
        let digest = self.make_digest(&left, &right)?;

        Ok(DigestResult { left, digest, right })
    }

    /// Computes the HMAC-SHA256 of `left || right` with this processor's key.
    pub fn make_digest(&self, left: &[u8], right: &[u8]) -> Result<Bytes, ComplexHandshakeError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.key).map_err(|_| ComplexHandshakeError::DigestLengthNotCorrect)?;
        mac.update(left);
        mac.update(right);

        let digest = mac.finalize().into_bytes();

        if digest.len() != RTMP_DIGEST_LENGTH {
            return Err(ComplexHandshakeError::DigestLengthNotCorrect);
        }

        Ok(Bytes::copy_from_slice(&digest))
    }
}
