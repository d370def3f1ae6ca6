//! RTMP client session.
//!
//! Drives the publish and play command sequences against a server:
//!
//! ```text
//! handshake -> connect(1) -> releaseStream(2) + FCPublish(3)
//!           -> createStream(4) -> publish -> NetStream.Publish.Start -> media
//! ```
//!
//! Up to and including `publish`/`play` the session runs as one task that
//! interleaves reads while waiting on its transactions. For publishing
//! under concurrency, [`ClientSession::split`] separates a read driver
//! (owning the inbound chunk state) from a [`Publisher`] whose writes take
//! a mutex per message, so every message's chunk sequence hits the wire
//! uninterleaved.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use freshet_amf::{Amf0Encoder, AmfObject, AmfValue};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, mpsc};

use crate::chunk::{
    CHUNK_SIZE_DEFAULT, CHUNK_SIZE_MAX, CHUNK_SIZE_MIN, CHUNK_STREAM_ID_AUDIO, CHUNK_STREAM_ID_DATA,
    CHUNK_STREAM_ID_VIDEO, Chunk, ChunkReader, ChunkWriter,
};
use crate::clock::{SharedClock, default_clock};
use crate::command_messages::netconnection::{NetConnectionCommand, NetConnectionCommandConnect};
use crate::command_messages::netstream::{NetStreamCommand, NetStreamCommandPublishPublishingType};
use crate::command_messages::on_status::{OnStatus, codes};
use crate::command_messages::{AmfVersion, Command, CommandResultLevel, CommandType};
use crate::error::RtmpError;
use crate::handshake;
use crate::handshake::simple::SimpleHandshakeClient;
use crate::messages::{MessageData, MessageType};
use crate::protocol_control_messages::{
    ProtocolControlMessageAcknowledgement, ProtocolControlMessageSetChunkSize,
    ProtocolControlMessageWindowAcknowledgementSize,
};
use crate::session::server::SessionData;
use crate::url::RtmpUrl;
use crate::user_control_messages::EventMessage;

mod error;

pub use error::ClientSessionError;

/// The acknowledgement window assumed until the server announces one.
const DEFAULT_ACKNOWLEDGEMENT_WINDOW_SIZE: u32 = 2_500_000;

/// The drop threshold commonly paired with
/// [`ClientSessionConfig::late_frame_drop_threshold_ms`].
pub const DEFAULT_LATE_FRAME_DROP_THRESHOLD_MS: u32 = 500;

/// The kind of a media track, for frame-drop telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// An audio frame.
    Audio,
    /// A video frame.
    Video,
}

/// A frame discarded by the too-late-frame policy.
#[derive(Debug, Clone, Copy)]
pub struct DroppedFrame {
    /// The track the frame belonged to.
    pub kind: MediaKind,
    /// The timestamp of the dropped frame.
    pub timestamp: u32,
    /// The most recent timestamp sent on that track.
    pub last_timestamp: u32,
}

/// Telemetry callback for dropped frames.
pub type FrameDropCallback = Arc<dyn Fn(DroppedFrame) + Send + Sync>;

/// Client session configuration.
#[derive(Clone)]
pub struct ClientSessionConfig {
    /// The chunk size announced and used for outbound messages.
    pub chunk_size: usize,
    /// The acknowledgement window announced to the server.
    pub window_ack_size: u32,
    /// The AMF version commands are encoded with.
    pub amf_version: AmfVersion,
    /// The wall-clock cap per command transaction.
    pub command_timeout: Duration,
    /// When set, frames older than the last sent timestamp by more than
    /// this many milliseconds are dropped instead of sent.
    pub late_frame_drop_threshold_ms: Option<u32>,
    /// Invoked for every frame the drop policy discards.
    pub on_frame_dropped: Option<FrameDropCallback>,
    /// The clock stamping outbound messages and the handshake.
    pub clock: SharedClock,
}

impl Default for ClientSessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE_DEFAULT,
            window_ack_size: i32::MAX as u32,
            amf_version: AmfVersion::Amf0,
            command_timeout: Duration::from_secs(5),
            late_frame_drop_threshold_ms: None,
            on_frame_dropped: None,
            clock: default_clock(),
        }
    }
}

/// The client session states, advancing monotonically; a reconnect starts
/// a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSessionState {
    /// Nothing happened yet.
    Idle,
    /// The handshake is in flight.
    Handshaking,
    /// The connect command is in flight.
    Connecting,
    /// The connection is established.
    Connected,
    /// A createStream command is in flight.
    CreatingStream,
    /// Publishing media.
    Publishing,
    /// Playing media.
    Playing,
    /// Close has started.
    Closing,
    /// The session is closed.
    Closed,
}

/// Out-of-band notifications surfaced to the application.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The server asks the client to reconnect elsewhere.
    ///
    /// The `tc_url` may be absent; the session never follows it by itself.
    ReconnectRequest {
        /// The new connection URL, when the server supplied one.
        tc_url: Option<String>,
    },
    /// Playback on a stream ended.
    StreamEof {
        /// The stream on which playback ended.
        stream_id: u32,
    },
    /// A stream ran dry.
    StreamDry {
        /// The dry stream.
        stream_id: u32,
    },
    /// Any other onStatus notification.
    Status {
        /// The status code.
        code: String,
        /// The status level.
        level: CommandResultLevel,
        /// The description, when the server sent one.
        description: Option<String>,
    },
}

enum TransactionOutcome {
    Result(Vec<AmfValue>),
    Error(Vec<AmfValue>),
}

/// An RTMP client session over any byte stream.
pub struct ClientSession<S> {
    config: ClientSessionConfig,
    url: RtmpUrl,
    io: S,
    state: ClientSessionState,
    read_buf: BytesMut,
    write_buf: Vec<u8>,
    chunk_reader: ChunkReader,
    chunk_writer: ChunkWriter,
    next_transaction_id: u32,
    /// Transactions awaiting their `_result`/`_error`.
    pending_transactions: HashMap<u32, ()>,
    completed_transactions: HashMap<u32, TransactionOutcome>,
    /// onStatus arrivals not yet claimed by a waiting operation.
    pending_statuses: VecDeque<OnStatus>,
    events: VecDeque<SessionEvent>,
    media: VecDeque<SessionData>,
    stream_id: Option<u32>,
    /// The window after which the server expects acknowledgements.
    peer_window_ack_size: u32,
    /// Total bytes read, wrapping at u32::MAX.
    sequence_number: u32,
    /// The sequence number the server last acknowledged.
    last_acknowledged: u32,
    last_audio_timestamp: Option<u32>,
    last_video_timestamp: Option<u32>,
}

impl<S> ClientSession<S> {
    /// Creates a session for the given URL.
    ///
    /// Configuration problems surface here, before any I/O.
    pub fn new(io: S, url: RtmpUrl, config: ClientSessionConfig) -> Result<Self, RtmpError> {
        if !(CHUNK_SIZE_MIN..=CHUNK_SIZE_MAX).contains(&config.chunk_size) {
            return Err(RtmpError::ClientSession(ClientSessionError::InvalidChunkSize(
                config.chunk_size,
            )));
        }

        Ok(Self {
            config,
            url,
            io,
            state: ClientSessionState::Idle,
            read_buf: BytesMut::new(),
            write_buf: Vec::new(),
            chunk_reader: ChunkReader::default(),
            chunk_writer: ChunkWriter::default(),
            next_transaction_id: 1,
            pending_transactions: HashMap::new(),
            completed_transactions: HashMap::new(),
            pending_statuses: VecDeque::new(),
            events: VecDeque::new(),
            media: VecDeque::new(),
            stream_id: None,
            peer_window_ack_size: DEFAULT_ACKNOWLEDGEMENT_WINDOW_SIZE,
            sequence_number: 0,
            last_acknowledged: 0,
            last_audio_timestamp: None,
            last_video_timestamp: None,
        })
    }

    /// The current session state.
    pub fn state(&self) -> ClientSessionState {
        self.state
    }

    /// The message stream id allocated by createStream, once known.
    pub fn stream_id(&self) -> Option<u32> {
        self.stream_id
    }

    /// Takes the next queued out-of-band event, if any.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    /// Total bytes read from the server, modulo 2^32.
    pub fn bytes_received(&self) -> u32 {
        self.sequence_number
    }

    /// The byte count the server last acknowledged.
    pub fn last_acknowledged(&self) -> u32 {
        self.last_acknowledged
    }

    fn next_transaction(&mut self) -> u32 {
        let id = self.next_transaction_id;
        self.next_transaction_id += 1;
        id
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ClientSession<S> {
    /// Performs the handshake and the connect command.
    pub async fn connect(&mut self) -> Result<(), RtmpError> {
        if self.state != ClientSessionState::Idle {
            return Err(RtmpError::ClientSession(ClientSessionError::UnexpectedState {
                expected: "idle",
            }));
        }

        self.state = ClientSessionState::Handshaking;
        self.handshake().await?;

        // Announce our chunk size and acknowledgement window before the
        // connect command, then use the new chunk size.
        ProtocolControlMessageSetChunkSize {
            chunk_size: self.config.chunk_size as u32,
        }
        .write(&mut self.write_buf, &mut self.chunk_writer)?;
        self.chunk_writer.set_chunk_size(self.config.chunk_size);

        ProtocolControlMessageWindowAcknowledgementSize {
            acknowledgement_window_size: self.config.window_ack_size,
        }
        .write(&mut self.write_buf, &mut self.chunk_writer)?;

        self.state = ClientSessionState::Connecting;

        let mut connect = NetConnectionCommandConnect::new(self.url.app.clone(), self.url.tc_url());
        connect.object_encoding = Some(match self.config.amf_version {
            AmfVersion::Amf0 => 0.0,
            AmfVersion::Amf3 => 3.0,
        });

        let transaction_id = self.next_transaction();
        self.send_command(
            transaction_id,
            CommandType::NetConnection(NetConnectionCommand::Connect(Box::new(connect))),
            0,
        )?;

        self.await_transaction(transaction_id).await?;
        self.state = ClientSessionState::Connected;

        Ok(())
    }

    /// Sends createStream and returns the allocated stream id.
    pub async fn create_stream(&mut self) -> Result<u32, RtmpError> {
        if self.state != ClientSessionState::Connected {
            return Err(RtmpError::ClientSession(ClientSessionError::UnexpectedState {
                expected: "connected",
            }));
        }

        self.state = ClientSessionState::CreatingStream;

        let transaction_id = self.next_transaction();
        self.send_command(transaction_id, CommandType::NetConnection(NetConnectionCommand::CreateStream), 0)?;

        let values = self.await_transaction(transaction_id).await?;

        // command object (usually null), then the stream id
        let stream_id = values
            .iter()
            .rev()
            .find_map(AmfValue::as_number)
            .map(|id| id as u32)
            .ok_or(RtmpError::ClientSession(ClientSessionError::Rejected {
                code: "NetConnection.CreateStream.Failed".to_string(),
                description: "no stream id in _result".to_string(),
            }))?;

        self.stream_id = Some(stream_id);
        self.state = ClientSessionState::Connected;

        Ok(stream_id)
    }

    /// Runs the publish sequence: releaseStream and FCPublish
    /// (fire-and-forget), createStream, publish, and the
    /// `NetStream.Publish.Start` gate.
    pub async fn publish(&mut self, publishing_type: NetStreamCommandPublishPublishingType) -> Result<(), RtmpError> {
        if self.state != ClientSessionState::Connected {
            return Err(RtmpError::ClientSession(ClientSessionError::UnexpectedState {
                expected: "connected",
            }));
        }

        let stream_key = self.url.stream_key.clone();

        // lifecycle hints, no response expected
        let transaction_id = self.next_transaction();
        self.send_command(
            transaction_id,
            CommandType::NetConnection(NetConnectionCommand::ReleaseStream {
                stream_name: stream_key.clone(),
            }),
            0,
        )?;
        let transaction_id = self.next_transaction();
        self.send_command(
            transaction_id,
            CommandType::NetConnection(NetConnectionCommand::FCPublish {
                stream_name: stream_key.clone(),
            }),
            0,
        )?;

        let stream_id = self.create_stream().await?;

        let transaction_id = self.next_transaction();
        self.send_command(
            transaction_id,
            CommandType::NetStream(NetStreamCommand::Publish {
                publishing_name: stream_key,
                publishing_type,
            }),
            stream_id,
        )?;

        self.await_status("NetStream.Publish.").await?;
        self.state = ClientSessionState::Publishing;

        Ok(())
    }

    /// Runs the play sequence: createStream, play, and the
    /// `NetStream.Play.Start` gate.
    pub async fn play(&mut self) -> Result<(), RtmpError> {
        let stream_key = self.url.stream_key.clone();
        let stream_id = self.create_stream().await?;

        let transaction_id = self.next_transaction();
        self.send_command(
            transaction_id,
            CommandType::NetStream(NetStreamCommand::Play {
                stream_name: stream_key,
                start: None,
                duration: None,
                reset: None,
            }),
            stream_id,
        )?;

        // the client announces its buffer before the server starts pushing
        EventMessage::SetBufferLength {
            stream_id,
            buffer_length_ms: 3000,
        }
        .write(&mut self.write_buf, &mut self.chunk_writer)?;

        loop {
            let status = self.await_status("NetStream.Play.").await?;
            // a reset may precede the start
            if status.code == codes::NET_STREAM_PLAY_START {
                break;
            }
        }

        self.state = ClientSessionState::Playing;

        Ok(())
    }

    /// Invokes a generic RPC on the server and returns the result values.
    pub async fn call(&mut self, command_object: AmfValue, arguments: Vec<AmfValue>) -> Result<Vec<AmfValue>, RtmpError> {
        let transaction_id = self.next_transaction();
        self.send_command(
            transaction_id,
            CommandType::NetConnection(NetConnectionCommand::Call {
                command_object,
                arguments,
            }),
            0,
        )?;

        self.await_transaction(transaction_id).await
    }

    /// Sends the `@setDataFrame("onMetaData", ...)` data message.
    ///
    /// Only permitted after publish; the metadata may be interleaved with
    /// media.
    pub async fn write_set_data_frame(&mut self, metadata: &AmfObject) -> Result<(), RtmpError> {
        let stream_id = self.require_publishing()?;

        let mut payload = Vec::new();
        let mut encoder = Amf0Encoder::new(&mut payload);
        encoder.encode_string("@setDataFrame")?;
        encoder.encode_string("onMetaData")?;
        encoder.encode_ecma_array(metadata)?;

        self.chunk_writer.write_chunk(
            &mut self.write_buf,
            Chunk::new(CHUNK_STREAM_ID_DATA, 0, MessageType::DataAMF0, stream_id, Bytes::from(payload)),
        )?;

        self.flush().await?;
        self.drain_inbound().await?;

        Ok(())
    }

    /// Writes one audio message.
    ///
    /// Returns false when the too-late-frame policy dropped the frame.
    pub async fn write_audio(&mut self, timestamp: u32, data: Bytes) -> Result<bool, RtmpError> {
        let stream_id = self.require_publishing()?;

        if self.drops_frame(MediaKind::Audio, timestamp) {
            return Ok(false);
        }
        self.last_audio_timestamp = Some(timestamp);

        self.chunk_writer.write_chunk(
            &mut self.write_buf,
            Chunk::new(CHUNK_STREAM_ID_AUDIO, timestamp, MessageType::Audio, stream_id, data),
        )?;

        self.flush().await?;
        self.drain_inbound().await?;

        Ok(true)
    }

    /// Writes one video message.
    ///
    /// Returns false when the too-late-frame policy dropped the frame.
    pub async fn write_video(&mut self, timestamp: u32, data: Bytes) -> Result<bool, RtmpError> {
        let stream_id = self.require_publishing()?;

        if self.drops_frame(MediaKind::Video, timestamp) {
            return Ok(false);
        }
        self.last_video_timestamp = Some(timestamp);

        self.chunk_writer.write_chunk(
            &mut self.write_buf,
            Chunk::new(CHUNK_STREAM_ID_VIDEO, timestamp, MessageType::Video, stream_id, data),
        )?;

        self.flush().await?;
        self.drain_inbound().await?;

        Ok(true)
    }

    /// Receives the next media message of a playing stream.
    pub async fn recv_media(&mut self) -> Result<SessionData, RtmpError> {
        if self.state != ClientSessionState::Playing {
            return Err(RtmpError::ClientSession(ClientSessionError::UnexpectedState {
                expected: "playing",
            }));
        }

        loop {
            if let Some(media) = self.media.pop_front() {
                return Ok(media);
            }

            self.flush().await?;

            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(RtmpError::ClientSession(ClientSessionError::Closed));
            }

            self.after_read(n as u32)?;
            self.process_chunks()?;
        }
    }

    /// Closes the session: unpublishes cleanly when publishing, cancels
    /// pending transactions and shuts the transport down.
    pub async fn close(&mut self) -> Result<(), RtmpError> {
        if self.state == ClientSessionState::Closed {
            return Ok(());
        }

        self.state = ClientSessionState::Closing;

        if let Some(stream_id) = self.stream_id {
            let stream_key = self.url.stream_key.clone();

            // fire-and-forget teardown
            let transaction_id = self.next_transaction();
            let _ = self.send_command(
                transaction_id,
                CommandType::NetConnection(NetConnectionCommand::FCUnpublish { stream_name: stream_key }),
                0,
            );
            let transaction_id = self.next_transaction();
            let _ = self.send_command(
                transaction_id,
                CommandType::NetStream(NetStreamCommand::CloseStream),
                stream_id,
            );
            let transaction_id = self.next_transaction();
            let _ = self.send_command(
                transaction_id,
                CommandType::NetStream(NetStreamCommand::DeleteStream {
                    stream_id: stream_id as f64,
                }),
                0,
            );
        }

        let _ = self.flush().await;
        let _ = self.io.shutdown().await;

        self.pending_transactions.clear();
        self.completed_transactions.clear();
        self.state = ClientSessionState::Closed;

        Ok(())
    }

    /// Splits a publishing session into a read driver and a publisher.
    ///
    /// The driver owns the inbound chunk state; the publisher's writes
    /// lock a shared writer so each message's chunks stay contiguous.
    pub fn split(self) -> Result<(ClientDriver<S>, Publisher<S>), RtmpError> {
        if self.state != ClientSessionState::Publishing {
            return Err(RtmpError::ClientSession(ClientSessionError::UnexpectedState {
                expected: "publishing",
            }));
        }

        let stream_id = self.stream_id.expect("publishing implies a stream id");
        let (read_half, write_half) = tokio::io::split(self.io);

        let shared = Arc::new(Mutex::new(SharedWriter {
            io: write_half,
            chunk_writer: self.chunk_writer,
        }));

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let driver = ClientDriver {
            io: read_half,
            read_buf: self.read_buf,
            chunk_reader: self.chunk_reader,
            writer: shared.clone(),
            peer_window_ack_size: self.peer_window_ack_size,
            sequence_number: self.sequence_number,
            last_acknowledged: self.last_acknowledged,
            events: events_tx,
        };

        let publisher = Publisher {
            writer: shared,
            stream_id,
            stream_key: self.url.stream_key.clone(),
            config: self.config,
            events: events_rx,
            last_audio_timestamp: self.last_audio_timestamp,
            last_video_timestamp: self.last_video_timestamp,
        };

        Ok((driver, publisher))
    }

    async fn handshake(&mut self) -> Result<(), RtmpError> {
        let mut handshaker = SimpleHandshakeClient::new(self.config.clock.clone());

        // C0 + C1
        handshaker.handshake(&mut std::io::Cursor::new(Bytes::new()), &mut self.write_buf)?;
        self.flush().await?;

        // S0 + S1 + S2
        const RESPONSE_SIZE: usize = 1 + 2 * handshake::RTMP_HANDSHAKE_SIZE;
        while self.read_buf.len() < RESPONSE_SIZE {
            let n = tokio::time::timeout(self.config.command_timeout, self.io.read_buf(&mut self.read_buf))
                .await
                .map_err(ClientSessionError::Timeout)??;
            if n == 0 {
                return Err(RtmpError::ClientSession(ClientSessionError::Closed));
            }
        }

        let mut cursor = std::io::Cursor::new(self.read_buf.split().freeze());
        handshaker.handshake(&mut cursor, &mut self.write_buf)?;
        self.flush().await?;

        // Anything past S2 already belongs to the chunk stream.
        let over_read = cursor.get_ref().slice(cursor.position() as usize..);
        if !over_read.is_empty() {
            self.read_buf.extend_from_slice(&over_read);
        }

        Ok(())
    }

    fn require_publishing(&self) -> Result<u32, RtmpError> {
        if self.state != ClientSessionState::Publishing {
            return Err(RtmpError::ClientSession(ClientSessionError::UnexpectedState {
                expected: "publishing",
            }));
        }

        Ok(self.stream_id.expect("publishing implies a stream id"))
    }

    fn drops_frame(&self, kind: MediaKind, timestamp: u32) -> bool {
        let last = match kind {
            MediaKind::Audio => self.last_audio_timestamp,
            MediaKind::Video => self.last_video_timestamp,
        };

        late_frame(&self.config, kind, last, timestamp)
    }

    fn send_command(&mut self, transaction_id: u32, command_type: CommandType, stream_id: u32) -> Result<(), RtmpError> {
        let expects_response = matches!(
            command_type,
            CommandType::NetConnection(NetConnectionCommand::Connect(_))
                | CommandType::NetConnection(NetConnectionCommand::CreateStream)
                | CommandType::NetConnection(NetConnectionCommand::Call { .. })
        );

        Command {
            transaction_id: transaction_id as f64,
            command_type,
        }
        .write(&mut self.write_buf, &mut self.chunk_writer, stream_id, self.config.amf_version)?;

        if expects_response {
            self.pending_transactions.insert(transaction_id, ());
        }

        Ok(())
    }

    /// Reads inbound data until the transaction completes or times out.
    async fn await_transaction(&mut self, transaction_id: u32) -> Result<Vec<AmfValue>, RtmpError> {
        let deadline = tokio::time::Instant::now() + self.config.command_timeout;

        loop {
            if let Some(outcome) = self.completed_transactions.remove(&transaction_id) {
                self.pending_transactions.remove(&transaction_id);

                return match outcome {
                    TransactionOutcome::Result(values) => Ok(values),
                    TransactionOutcome::Error(values) => Err(RtmpError::ClientSession(rejection_from_values(&values))),
                };
            }

            self.flush().await?;

            let read = tokio::time::timeout_at(deadline, self.io.read_buf(&mut self.read_buf)).await;

            let n = match read {
                Ok(result) => result?,
                Err(elapsed) => {
                    // the slot frees on timeout, the session stays usable
                    self.pending_transactions.remove(&transaction_id);
                    return Err(RtmpError::ClientSession(ClientSessionError::Timeout(elapsed)));
                }
            };

            if n == 0 {
                return Err(RtmpError::ClientSession(ClientSessionError::Closed));
            }

            self.after_read(n as u32)?;
            self.process_chunks()?;
        }
    }

    /// Reads inbound data until an onStatus with the given code prefix
    /// arrives; error-level statuses fail.
    async fn await_status(&mut self, code_prefix: &str) -> Result<OnStatus, RtmpError> {
        let deadline = tokio::time::Instant::now() + self.config.command_timeout;

        loop {
            while let Some(status) = self.pending_statuses.pop_front() {
                if !status.code.starts_with(code_prefix) {
                    continue;
                }

                if status.level == CommandResultLevel::Error {
                    return Err(RtmpError::ClientSession(ClientSessionError::Status {
                        code: status.code,
                        description: status.description.unwrap_or_default(),
                    }));
                }

                return Ok(status);
            }

            self.flush().await?;

            let n = tokio::time::timeout_at(deadline, self.io.read_buf(&mut self.read_buf))
                .await
                .map_err(ClientSessionError::Timeout)??;

            if n == 0 {
                return Err(RtmpError::ClientSession(ClientSessionError::Closed));
            }

            self.after_read(n as u32)?;
            self.process_chunks()?;
        }
    }

    /// Opportunistically processes whatever the server sent without
    /// blocking, keeping acknowledgements and pings flowing while media is
    /// written.
    async fn drain_inbound(&mut self) -> Result<(), RtmpError> {
        loop {
            match tokio::time::timeout(Duration::ZERO, self.io.read_buf(&mut self.read_buf)).await {
                Ok(Ok(0)) => return Err(RtmpError::ClientSession(ClientSessionError::Closed)),
                Ok(Ok(n)) => {
                    self.after_read(n as u32)?;
                    self.process_chunks()?;
                }
                Ok(Err(e)) => return Err(e.into()),
                // nothing buffered
                Err(_) => break,
            }
        }

        if !self.write_buf.is_empty() {
            self.flush().await?;
        }

        Ok(())
    }

    /// Acknowledgement bookkeeping after reading `n` bytes.
    fn after_read(&mut self, n: u32) -> Result<(), RtmpError> {
        if (self.sequence_number % self.peer_window_ack_size) + n >= self.peer_window_ack_size {
            ProtocolControlMessageAcknowledgement {
                sequence_number: self.sequence_number,
            }
            .write(&mut self.write_buf, &mut self.chunk_writer)?;
        }

        self.sequence_number = self.sequence_number.wrapping_add(n);

        Ok(())
    }

    fn process_chunks(&mut self) -> Result<(), RtmpError> {
        while let Some(chunk) = self.chunk_reader.read_chunk(&mut self.read_buf)? {
            let timestamp = chunk.message_header.timestamp;

            let msg = MessageData::read(&chunk)?;
            self.process_message(msg, timestamp)?;
        }

        Ok(())
    }

    fn process_message(&mut self, msg: MessageData, timestamp: u32) -> Result<(), RtmpError> {
        match msg {
            MessageData::SetChunkSize(msg) => {
                if !self.chunk_reader.update_max_chunk_size(msg.chunk_size as usize) {
                    return Err(RtmpError::ClientSession(ClientSessionError::InvalidChunkSize(
                        msg.chunk_size as usize,
                    )));
                }
            }
            MessageData::Abort(msg) => self.chunk_reader.abort(msg.chunk_stream_id),
            MessageData::Acknowledgement(msg) => {
                self.last_acknowledged = msg.sequence_number;
            }
            MessageData::SetAcknowledgementWindowSize(msg) => {
                self.peer_window_ack_size = msg.acknowledgement_window_size.max(1);
            }
            MessageData::SetPeerBandwidth(msg) => {
                // answer with our window size within one window
                ProtocolControlMessageWindowAcknowledgementSize {
                    acknowledgement_window_size: msg.acknowledgement_window_size,
                }
                .write(&mut self.write_buf, &mut self.chunk_writer)?;
            }
            MessageData::UserControlEvent(event) => self.process_user_control(event)?,
            MessageData::Command(command) => self.process_command(command),
            MessageData::AudioData { data } => self.media.push_back(SessionData::Audio { timestamp, data }),
            MessageData::VideoData { data } => self.media.push_back(SessionData::Video { timestamp, data }),
            MessageData::DataAmf0 { data } => self.media.push_back(SessionData::Amf0 { timestamp, data }),
            MessageData::Aggregate { messages } => {
                for sub in messages {
                    match sub.msg_type_id {
                        MessageType::Audio => self.media.push_back(SessionData::Audio {
                            timestamp: sub.timestamp,
                            data: sub.data,
                        }),
                        MessageType::Video => self.media.push_back(SessionData::Video {
                            timestamp: sub.timestamp,
                            data: sub.data,
                        }),
                        _ => {}
                    }
                }
            }
            MessageData::Unknown(msg) => {
                tracing::debug!(msg_type_id = msg.msg_type_id.0, "ignoring unknown message");
            }
        }

        Ok(())
    }

    fn process_user_control(&mut self, event: EventMessage) -> Result<(), RtmpError> {
        match event {
            EventMessage::PingRequest { timestamp } => {
                EventMessage::PingResponse { timestamp }.write(&mut self.write_buf, &mut self.chunk_writer)?;
            }
            EventMessage::StreamEof { stream_id } => {
                self.events.push_back(SessionEvent::StreamEof { stream_id });
            }
            EventMessage::StreamDry { stream_id } => {
                self.events.push_back(SessionEvent::StreamDry { stream_id });
            }
            event => {
                tracing::debug!(?event, "ignoring user control event");
            }
        }

        Ok(())
    }

    fn process_command(&mut self, command: Command) {
        let transaction_id = command.transaction_id as u32;

        match command.command_type {
            CommandType::Result { values } => {
                if self.pending_transactions.remove(&transaction_id).is_some() {
                    self.completed_transactions
                        .insert(transaction_id, TransactionOutcome::Result(values));
                } else {
                    // soft failure: the response is reported and discarded
                    tracing::warn!(transaction_id = %transaction_id, "_result for unknown transaction");
                }
            }
            CommandType::Error { values } => {
                if self.pending_transactions.remove(&transaction_id).is_some() {
                    self.completed_transactions
                        .insert(transaction_id, TransactionOutcome::Error(values));
                } else {
                    tracing::warn!(transaction_id = %transaction_id, "_error for unknown transaction");
                }
            }
            CommandType::OnStatus(status) => {
                if status.code == codes::NET_CONNECTION_CONNECT_RECONNECT_REQUEST {
                    self.events.push_back(SessionEvent::ReconnectRequest {
                        tc_url: status.tc_url().map(str::to_string),
                    });
                    return;
                }

                self.events.push_back(SessionEvent::Status {
                    code: status.code.clone(),
                    level: status.level.clone(),
                    description: status.description.clone(),
                });
                self.pending_statuses.push_back(status);
            }
            other => {
                tracing::debug!(?other, "ignoring server command");
            }
        }
    }

    async fn flush(&mut self) -> Result<(), RtmpError> {
        if !self.write_buf.is_empty() {
            self.io.write_all(&self.write_buf).await?;
            self.io.flush().await?;
            self.write_buf.clear();
        }

        Ok(())
    }
}

/// Extracts the code and description out of an `_error` response's info
/// object.
fn rejection_from_values(values: &[AmfValue]) -> ClientSessionError {
    let info = values.iter().find_map(AmfValue::as_object);

    let code = info
        .and_then(|info| info.get("code"))
        .and_then(AmfValue::as_str)
        .unwrap_or("NetConnection.Call.Failed")
        .to_string();
    let description = info
        .and_then(|info| info.get("description"))
        .and_then(AmfValue::as_str)
        .unwrap_or_default()
        .to_string();

    ClientSessionError::Rejected { code, description }
}

/// The write half shared between the read driver and the publisher.
struct SharedWriter<S> {
    io: WriteHalf<S>,
    chunk_writer: ChunkWriter,
}

impl<S: AsyncRead + AsyncWrite> SharedWriter<S> {
    /// Writes one message as an atomic chunk sequence and flushes.
    async fn write_message(&mut self, chunk: Chunk) -> Result<(), RtmpError> {
        let mut buf = Vec::new();
        self.chunk_writer.write_chunk(&mut buf, chunk)?;
        self.io.write_all(&buf).await?;
        self.io.flush().await?;

        Ok(())
    }
}

/// The read side of a split publishing session.
///
/// Owns the inbound chunk state; run it on its own task.
pub struct ClientDriver<S> {
    io: ReadHalf<S>,
    read_buf: BytesMut,
    chunk_reader: ChunkReader,
    writer: Arc<Mutex<SharedWriter<S>>>,
    peer_window_ack_size: u32,
    sequence_number: u32,
    last_acknowledged: u32,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<S> ClientDriver<S> {
    /// The byte count the server last acknowledged.
    pub fn last_acknowledged(&self) -> u32 {
        self.last_acknowledged
    }
}

impl<S: AsyncRead + AsyncWrite> ClientDriver<S> {
    /// Runs the read loop until the server closes the connection.
    pub async fn run(mut self) -> Result<(), RtmpError> {
        loop {
            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Ok(());
            }

            let n = n as u32;
            if (self.sequence_number % self.peer_window_ack_size) + n >= self.peer_window_ack_size {
                let mut writer = self.writer.lock().await;
                let mut buf = Vec::new();
                ProtocolControlMessageAcknowledgement {
                    sequence_number: self.sequence_number,
                }
                .write(&mut buf, &mut writer.chunk_writer)?;
                writer.io.write_all(&buf).await?;
            }
            self.sequence_number = self.sequence_number.wrapping_add(n);

            while let Some(chunk) = self.chunk_reader.read_chunk(&mut self.read_buf)? {
                let msg = MessageData::read(&chunk)?;
                self.process_message(msg).await?;
            }
        }
    }

    async fn process_message(&mut self, msg: MessageData) -> Result<(), RtmpError> {
        match msg {
            MessageData::SetChunkSize(msg) => {
                if !self.chunk_reader.update_max_chunk_size(msg.chunk_size as usize) {
                    return Err(RtmpError::ClientSession(ClientSessionError::InvalidChunkSize(
                        msg.chunk_size as usize,
                    )));
                }
            }
            MessageData::Abort(msg) => self.chunk_reader.abort(msg.chunk_stream_id),
            MessageData::Acknowledgement(msg) => {
                self.last_acknowledged = msg.sequence_number;
            }
            MessageData::SetAcknowledgementWindowSize(msg) => {
                self.peer_window_ack_size = msg.acknowledgement_window_size.max(1);
            }
            MessageData::UserControlEvent(EventMessage::PingRequest { timestamp }) => {
                let mut writer = self.writer.lock().await;
                let mut buf = Vec::new();
                EventMessage::PingResponse { timestamp }.write(&mut buf, &mut writer.chunk_writer)?;
                writer.io.write_all(&buf).await?;
            }
            MessageData::UserControlEvent(EventMessage::StreamEof { stream_id }) => {
                let _ = self.events.send(SessionEvent::StreamEof { stream_id });
            }
            MessageData::Command(command) => {
                if let CommandType::OnStatus(status) = command.command_type {
                    let event = if status.code == codes::NET_CONNECTION_CONNECT_RECONNECT_REQUEST {
                        SessionEvent::ReconnectRequest {
                            tc_url: status.tc_url().map(str::to_string),
                        }
                    } else {
                        SessionEvent::Status {
                            code: status.code,
                            level: status.level,
                            description: status.description,
                        }
                    };

                    let _ = self.events.send(event);
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// The write side of a split publishing session.
pub struct Publisher<S> {
    writer: Arc<Mutex<SharedWriter<S>>>,
    stream_id: u32,
    stream_key: String,
    config: ClientSessionConfig,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    last_audio_timestamp: Option<u32>,
    last_video_timestamp: Option<u32>,
}

impl<S: AsyncRead + AsyncWrite> Publisher<S> {
    /// The message stream id media is published on.
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// Receives the next out-of-band event surfaced by the driver.
    pub async fn recv_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Writes one audio message.
    ///
    /// Returns false when the too-late-frame policy dropped the frame.
    pub async fn write_audio(&mut self, timestamp: u32, data: Bytes) -> Result<bool, RtmpError> {
        if late_frame(&self.config, MediaKind::Audio, self.last_audio_timestamp, timestamp) {
            return Ok(false);
        }
        self.last_audio_timestamp = Some(timestamp);

        self.writer
            .lock()
            .await
            .write_message(Chunk::new(CHUNK_STREAM_ID_AUDIO, timestamp, MessageType::Audio, self.stream_id, data))
            .await?;

        Ok(true)
    }

    /// Writes one video message.
    ///
    /// Returns false when the too-late-frame policy dropped the frame.
    pub async fn write_video(&mut self, timestamp: u32, data: Bytes) -> Result<bool, RtmpError> {
        if late_frame(&self.config, MediaKind::Video, self.last_video_timestamp, timestamp) {
            return Ok(false);
        }
        self.last_video_timestamp = Some(timestamp);

        self.writer
            .lock()
            .await
            .write_message(Chunk::new(CHUNK_STREAM_ID_VIDEO, timestamp, MessageType::Video, self.stream_id, data))
            .await?;

        Ok(true)
    }

    /// Sends the `@setDataFrame("onMetaData", ...)` data message.
    pub async fn write_set_data_frame(&mut self, metadata: &AmfObject) -> Result<(), RtmpError> {
        let mut payload = Vec::new();
        let mut encoder = Amf0Encoder::new(&mut payload);
        encoder.encode_string("@setDataFrame")?;
        encoder.encode_string("onMetaData")?;
        encoder.encode_ecma_array(metadata)?;

        self.writer
            .lock()
            .await
            .write_message(Chunk::new(
                CHUNK_STREAM_ID_DATA,
                0,
                MessageType::DataAMF0,
                self.stream_id,
                Bytes::from(payload),
            ))
            .await?;

        Ok(())
    }

    /// Ends the publish: FCUnpublish, closeStream and deleteStream, then
    /// shuts the write half down.
    pub async fn close(mut self) -> Result<(), RtmpError> {
        let mut writer = self.writer.lock().await;

        let mut buf = Vec::new();
        Command {
            transaction_id: 0.0,
            command_type: CommandType::NetConnection(NetConnectionCommand::FCUnpublish {
                stream_name: self.stream_key.clone(),
            }),
        }
        .write(&mut buf, &mut writer.chunk_writer, 0, self.config.amf_version)?;
        Command {
            transaction_id: 0.0,
            command_type: CommandType::NetStream(NetStreamCommand::CloseStream),
        }
        .write(&mut buf, &mut writer.chunk_writer, self.stream_id, self.config.amf_version)?;
        Command {
            transaction_id: 0.0,
            command_type: CommandType::NetStream(NetStreamCommand::DeleteStream {
                stream_id: self.stream_id as f64,
            }),
        }
        .write(&mut buf, &mut writer.chunk_writer, 0, self.config.amf_version)?;

        writer.io.write_all(&buf).await?;
        writer.io.flush().await?;
        let _ = writer.io.shutdown().await;

        drop(writer);
        self.events.close();

        Ok(())
    }
}

fn late_frame(config: &ClientSessionConfig, kind: MediaKind, last: Option<u32>, timestamp: u32) -> bool {
    let Some(threshold) = config.late_frame_drop_threshold_ms else {
        return false;
    };
    let Some(last) = last else { return false };

    let late = timestamp < last && last - timestamp > threshold;
    if late {
        if let Some(callback) = &config.on_frame_dropped {
            callback(DroppedFrame {
                kind,
                timestamp,
                last_timestamp: last,
            });
        }
    }

    late
}
