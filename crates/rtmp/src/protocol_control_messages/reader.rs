//! Reading protocol control messages.

use std::io::{self, Cursor};

use byteorder::{BigEndian, ReadBytesExt};
use num_traits::FromPrimitive;

use super::{
    ProtocolControlMessageAbort, ProtocolControlMessageAcknowledgement, ProtocolControlMessageSetChunkSize,
    ProtocolControlMessageSetPeerBandwidth, ProtocolControlMessageSetPeerBandwidthLimitType,
    ProtocolControlMessageWindowAcknowledgementSize,
};

impl ProtocolControlMessageSetChunkSize {
    /// Reads a [`ProtocolControlMessageSetChunkSize`] from the given data.
    pub fn read(data: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(data);
        // the first bit is reserved and must be ignored
        let chunk_size = cursor.read_u32::<BigEndian>()? & 0x7FFF_FFFF;

        Ok(Self { chunk_size })
    }
}

impl ProtocolControlMessageAbort {
    /// Reads a [`ProtocolControlMessageAbort`] from the given data.
    pub fn read(data: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let chunk_stream_id = cursor.read_u32::<BigEndian>()?;

        Ok(Self { chunk_stream_id })
    }
}

impl ProtocolControlMessageAcknowledgement {
    /// Reads a [`ProtocolControlMessageAcknowledgement`] from the given data.
    pub fn read(data: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let sequence_number = cursor.read_u32::<BigEndian>()?;

        Ok(Self { sequence_number })
    }
}

impl ProtocolControlMessageWindowAcknowledgementSize {
    /// Reads a [`ProtocolControlMessageWindowAcknowledgementSize`] from the given data.
    pub fn read(data: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let acknowledgement_window_size = cursor.read_u32::<BigEndian>()?;

        Ok(Self {
            acknowledgement_window_size,
        })
    }
}

impl ProtocolControlMessageSetPeerBandwidth {
    /// Reads a [`ProtocolControlMessageSetPeerBandwidth`] from the given data.
    pub fn read(data: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let acknowledgement_window_size = cursor.read_u32::<BigEndian>()?;
        let limit_type = cursor.read_u8()?;

        // unknown limit types are treated as the conservative hard limit
        let limit_type = ProtocolControlMessageSetPeerBandwidthLimitType::from_u8(limit_type)
            .unwrap_or(ProtocolControlMessageSetPeerBandwidthLimitType::Hard);

        Ok(Self {
            acknowledgement_window_size,
            limit_type,
        })
    }
}
