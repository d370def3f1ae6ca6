//! Writing protocol control messages.

use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;

use super::{
    ProtocolControlMessageAbort, ProtocolControlMessageAcknowledgement, ProtocolControlMessageSetChunkSize,
    ProtocolControlMessageSetPeerBandwidth, ProtocolControlMessageWindowAcknowledgementSize,
};
use crate::chunk::{CHUNK_STREAM_ID_PROTOCOL_CONTROL, Chunk, ChunkWriter};
use crate::error::RtmpError;
use crate::messages::MessageType;

fn write_control_chunk(
    io: &mut impl io::Write,
    writer: &mut ChunkWriter,
    msg_type_id: MessageType,
    payload: Vec<u8>,
) -> Result<(), RtmpError> {
    writer.write_chunk(
        io,
        Chunk::new(
            CHUNK_STREAM_ID_PROTOCOL_CONTROL, // chunk stream must be 2
            0,                                // timestamps are ignored
            msg_type_id,
            0, // message stream id is ignored
            Bytes::from(payload),
        ),
    )?;

    Ok(())
}

impl ProtocolControlMessageSetChunkSize {
    /// Writes the [`ProtocolControlMessageSetChunkSize`] to the given writer.
    pub fn write(&self, io: &mut impl io::Write, writer: &mut ChunkWriter) -> Result<(), RtmpError> {
        // According to spec the first bit must be 0.
        let chunk_size = self.chunk_size & 0x7FFFFFFF; // 31 bits only

        write_control_chunk(io, writer, MessageType::SetChunkSize, chunk_size.to_be_bytes().to_vec())
    }
}

impl ProtocolControlMessageAbort {
    /// Writes the [`ProtocolControlMessageAbort`] to the given writer.
    pub fn write(&self, io: &mut impl io::Write, writer: &mut ChunkWriter) -> Result<(), RtmpError> {
        write_control_chunk(io, writer, MessageType::Abort, self.chunk_stream_id.to_be_bytes().to_vec())
    }
}

impl ProtocolControlMessageAcknowledgement {
    /// Writes the [`ProtocolControlMessageAcknowledgement`] to the given writer.
    pub fn write(&self, io: &mut impl io::Write, writer: &mut ChunkWriter) -> Result<(), RtmpError> {
        write_control_chunk(
            io,
            writer,
            MessageType::Acknowledgement,
            self.sequence_number.to_be_bytes().to_vec(),
        )
    }
}

impl ProtocolControlMessageWindowAcknowledgementSize {
    /// Writes the [`ProtocolControlMessageWindowAcknowledgementSize`] to the given writer.
    pub fn write(&self, io: &mut impl io::Write, writer: &mut ChunkWriter) -> Result<(), RtmpError> {
        write_control_chunk(
            io,
            writer,
            MessageType::WindowAcknowledgementSize,
            self.acknowledgement_window_size.to_be_bytes().to_vec(),
        )
    }
}

impl ProtocolControlMessageSetPeerBandwidth {
    /// Writes the [`ProtocolControlMessageSetPeerBandwidth`] to the given writer.
    pub fn write(&self, io: &mut impl io::Write, writer: &mut ChunkWriter) -> Result<(), RtmpError> {
        let mut data = Vec::new();
        data.write_u32::<BigEndian>(self.acknowledgement_window_size)
            .expect("Failed to write window size");
        data.write_u8(self.limit_type as u8).expect("Failed to write limit type");

        write_control_chunk(io, writer, MessageType::SetPeerBandwidth, data)
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::chunk::ChunkReader;
    use crate::protocol_control_messages::ProtocolControlMessageSetPeerBandwidthLimitType;

    #[test]
    fn write_set_chunk_size() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        ProtocolControlMessageSetChunkSize { chunk_size: 256 }
            .write(&mut buf, &mut writer)
            .unwrap();

        // the exact 16 bytes peers expect for SetChunkSize(256)
        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                0x02, // fmt 0, csid 2
                0x00, 0x00, 0x00, // timestamp 0
                0x00, 0x00, 0x04, // length 4
                0x01, // type id 1
                0x00, 0x00, 0x00, 0x00, // stream id 0
                0x00, 0x00, 0x01, 0x00, // 256
            ]
        );
    }

    #[test]
    fn write_acknowledgement() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        ProtocolControlMessageAcknowledgement { sequence_number: 10 }
            .write(&mut buf, &mut writer)
            .unwrap();

        // the exact 16 bytes peers expect for Acknowledgement(10)
        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                0x02, // fmt 0, csid 2
                0x00, 0x00, 0x00, // timestamp 0
                0x00, 0x00, 0x04, // length 4
                0x03, // type id 3
                0x00, 0x00, 0x00, 0x00, // stream id 0
                0x00, 0x00, 0x00, 0x0A, // 10
            ]
        );
    }

    #[test]
    fn write_abort() {
        let mut writer = ChunkWriter::default();
        let mut buf = BytesMut::new();

        let mut out = Vec::new();
        ProtocolControlMessageAbort { chunk_stream_id: 4 }
            .write(&mut out, &mut writer)
            .unwrap();
        buf.extend_from_slice(&out);

        let mut reader = ChunkReader::default();
        let chunk = reader.read_chunk(&mut buf).expect("read chunk").expect("chunk");
        assert_eq!(chunk.basic_header.chunk_stream_id, 0x02);
        assert_eq!(chunk.message_header.msg_type_id.0, 0x02);
        assert_eq!(chunk.payload, Bytes::from_static(&[0x00, 0x00, 0x00, 0x04]));
    }

    #[test]
    fn write_window_acknowledgement_size() {
        let mut writer = ChunkWriter::default();
        let mut buf = BytesMut::new();

        let mut out = Vec::new();
        ProtocolControlMessageWindowAcknowledgementSize {
            acknowledgement_window_size: 1,
        }
        .write(&mut out, &mut writer)
        .unwrap();
        buf.extend_from_slice(&out);

        let mut reader = ChunkReader::default();
        let chunk = reader.read_chunk(&mut buf).expect("read chunk").expect("chunk");
        assert_eq!(chunk.basic_header.chunk_stream_id, 0x02);
        assert_eq!(chunk.message_header.msg_type_id.0, 0x05);
        assert_eq!(chunk.payload, Bytes::from_static(&[0x00, 0x00, 0x00, 0x01]));
    }

    #[test]
    fn write_set_peer_bandwidth() {
        let mut writer = ChunkWriter::default();
        let mut buf = BytesMut::new();

        let mut out = Vec::new();
        ProtocolControlMessageSetPeerBandwidth {
            acknowledgement_window_size: 1,
            limit_type: ProtocolControlMessageSetPeerBandwidthLimitType::Dynamic,
        }
        .write(&mut out, &mut writer)
        .unwrap();
        buf.extend_from_slice(&out);

        let mut reader = ChunkReader::default();
        let chunk = reader.read_chunk(&mut buf).expect("read chunk").expect("chunk");
        assert_eq!(chunk.basic_header.chunk_stream_id, 0x02);
        assert_eq!(chunk.message_header.msg_type_id.0, 0x06);
        assert_eq!(chunk.payload, Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x02]));
    }
}
