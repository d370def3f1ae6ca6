//! RTMP server session.

use std::collections::HashSet;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chunk::{
    CHUNK_SIZE_DEFAULT, CHUNK_SIZE_MAX, CHUNK_SIZE_MIN, CHUNK_STREAM_ID_AUDIO, CHUNK_STREAM_ID_DATA,
    CHUNK_STREAM_ID_VIDEO, Chunk, ChunkReader, ChunkWriter,
};
use crate::clock::{SharedClock, default_clock};
use crate::command_messages::netconnection::{NetConnectionCommand, NetConnectionCommandConnectResult};
use crate::command_messages::netstream::{NetStreamCommand, NetStreamCommandPublishPublishingType};
use crate::command_messages::on_status::{OnStatus, codes};
use crate::command_messages::{AmfVersion, Command, CommandResultLevel, CommandType};
use crate::error::RtmpError;
use crate::handshake;
use crate::handshake::HandshakeServer;
use crate::messages::{MessageData, MessageType};
use crate::protocol_control_messages::{
    ProtocolControlMessageAcknowledgement, ProtocolControlMessageSetChunkSize, ProtocolControlMessageSetPeerBandwidth,
    ProtocolControlMessageSetPeerBandwidthLimitType, ProtocolControlMessageWindowAcknowledgementSize,
};
use crate::user_control_messages::EventMessage;

mod error;
mod handler;
mod provider;

pub use error::ServerSessionError;
pub use handler::{ConnectDecision, PlayMedia, PlaySender, SessionData, SessionHandler};
pub use provider::{SequentialStreamIdProvider, StreamIdProvider};

// The default acknowledgement window size that is used until the client sends a
// new acknowledgement window size. A common value used by other media servers.
const DEFAULT_ACKNOWLEDGEMENT_WINDOW_SIZE: u32 = 2_500_000; // 2.5 MB

/// Server session configuration.
pub struct ServerSessionConfig {
    /// The chunk size announced and used for outbound messages.
    pub chunk_size: usize,
    /// The acknowledgement window announced to the client.
    pub window_ack_size: u32,
    /// The clock stamping outbound messages and the handshake.
    pub clock: SharedClock,
    /// Allocates the stream ids handed out by createStream.
    pub stream_id_provider: Box<dyn StreamIdProvider>,
}

impl Default for ServerSessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE_DEFAULT,
            window_ack_size: i32::MAX as u32,
            clock: default_clock(),
            stream_id_provider: Box::new(SequentialStreamIdProvider::default()),
        }
    }
}

impl ServerSessionConfig {
    /// Validates the configuration before any I/O happens.
    pub fn validate(&self) -> Result<(), RtmpError> {
        if !(CHUNK_SIZE_MIN..=CHUNK_SIZE_MAX).contains(&self.chunk_size) {
            return Err(RtmpError::Session(ServerSessionError::InvalidChunkSize(self.chunk_size)));
        }

        Ok(())
    }
}

/// A RTMP server session that is used to communicate with a client.
///
/// This provides a high-level API to drive a RTMP session.
pub struct ServerSession<S, H> {
    config: ServerSessionConfig,
    /// A reconnect request is sent once when this token gets cancelled.
    cancel_token: Option<CancellationToken>,
    reconnect_request_sent: bool,
    /// When you connect via rtmp, you specify the app name in the url.
    /// For example: `rtmp://localhost:1935/live/xyz` connects to the app
    /// "live" with the stream key "xyz".
    app_name: Option<String>,
    /// Used to read and write data.
    io: S,
    handler: H,
    /// The window size after which the client expects acknowledgements.
    acknowledgement_window_size: u32,
    /// The number of bytes read from the stream, wrapping at u32::MAX.
    /// Used to know when to send acknowledgements.
    sequence_number: u32,
    /// The sequence number the peer last acknowledged; never decreases.
    last_acknowledged: u32,
    /// Buffer to read data into.
    read_buf: BytesMut,
    /// Buffer to write data to.
    write_buf: Vec<u8>,
    /// Sometimes the handshake reads too much data; this flag indicates
    /// that data is ready to parse before the next socket read.
    skip_read: bool,
    chunk_reader: ChunkReader,
    chunk_writer: ChunkWriter,
    /// Streams currently publishing.
    publishing_stream_ids: Vec<u32>,
    /// Streams currently playing.
    playing_stream_ids: HashSet<u32>,
    /// Media queued by the application for playing streams.
    play_tx: mpsc::Sender<PlayMedia>,
    play_rx: mpsc::Receiver<PlayMedia>,
}

impl<S, H> ServerSession<S, H> {
    /// Creates a session with the default configuration.
    pub fn new(io: S, handler: H) -> Self {
        Self::with_config(io, handler, ServerSessionConfig::default())
    }

    /// Creates a session with the given configuration.
    pub fn with_config(io: S, handler: H, config: ServerSessionConfig) -> Self {
        let (play_tx, play_rx) = mpsc::channel(64);

        Self {
            config,
            cancel_token: None,
            reconnect_request_sent: false,
            app_name: None,
            io,
            handler,
            acknowledgement_window_size: DEFAULT_ACKNOWLEDGEMENT_WINDOW_SIZE,
            sequence_number: 0,
            last_acknowledged: 0,
            skip_read: false,
            chunk_reader: ChunkReader::default(),
            chunk_writer: ChunkWriter::default(),
            read_buf: BytesMut::new(),
            write_buf: Vec::new(),
            publishing_stream_ids: Vec::new(),
            playing_stream_ids: HashSet::new(),
            play_tx,
            play_rx,
        }
    }
}

impl<S, H> ServerSession<S, H> {
    /// Attaches a cancellation token to the session.
    ///
    /// When the token gets cancelled the session asks the client to
    /// reconnect elsewhere with a `NetConnection.Connect.ReconnectRequest`
    /// and keeps serving until the client follows up; the client decides
    /// whether to act on it.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Total bytes read from the client, modulo 2^32.
    pub fn bytes_received(&self) -> u32 {
        self.sequence_number
    }

    /// The byte count the client last acknowledged.
    pub fn last_acknowledged(&self) -> u32 {
        self.last_acknowledged
    }
}

impl<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin, H: SessionHandler> ServerSession<S, H> {
    /// Runs the session to completion.
    ///
    /// The result is true if all publishers have disconnected cleanly;
    /// false detects non-graceful disconnects (ie. the client crashed).
    pub async fn run(mut self) -> Result<bool, RtmpError> {
        self.config.validate()?;

        let mut handshaker = HandshakeServer::new(self.config.clock.clone());
        // Run the handshake to completion
        loop {
            match self.drive_handshake(&mut handshaker).await {
                Ok(false) => self.flush().await?, // Continue driving
                Ok(true) => break,                // Handshake is complete
                Err(e) => return Err(e),
            }
        }

        // The handshake buffers are not needed anymore
        drop(handshaker);

        tracing::debug!("handshake complete");

        loop {
            match self.drive().await {
                Ok(true) => self.flush().await?, // Continue driving
                Ok(false) => break,              // Client has closed the connection
                Err(err) if err.is_client_closed() => {
                    tracing::debug!("client closed the connection");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        // Most clients just disconnect without cleanly deleting their
        // streams, so only clean publisher shutdown counts.
        let clean = self.publishing_stream_ids.is_empty();
        for stream_id in std::mem::take(&mut self.publishing_stream_ids) {
            self.handler.on_unpublish(stream_id).await?;
        }

        Ok(clean)
    }

    /// Drives the handshake stage.
    ///
    /// Returns true once the handshake is complete.
    async fn drive_handshake(&mut self, handshaker: &mut HandshakeServer) -> Result<bool, RtmpError> {
        // Read the handshake data + 1 byte for the version
        const READ_SIZE: usize = handshake::RTMP_HANDSHAKE_SIZE + 1;
        self.read_buf.reserve(READ_SIZE);

        let mut bytes_read = 0;
        while bytes_read < READ_SIZE {
            let n = tokio::time::timeout(Duration::from_secs(2), self.io.read_buf(&mut self.read_buf))
                .await
                .map_err(ServerSessionError::Timeout)??;
            if n == 0 {
                return Err(RtmpError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }

            bytes_read += n;
            self.sequence_number = self.sequence_number.wrapping_add(n as u32);
        }

        let mut cursor = std::io::Cursor::new(self.read_buf.split().freeze());

        handshaker.handshake(&mut cursor, &mut self.write_buf)?;

        if handshaker.is_finished() {
            let over_read = cursor.get_ref().slice(cursor.position() as usize..);

            if !over_read.is_empty() {
                self.skip_read = true;
                self.read_buf.extend_from_slice(&over_read);
            }

            self.send_set_chunk_size()?;

            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Drives the established session: parses inbound messages and forwards
    /// any queued play media.
    ///
    /// Returns false when the client has closed the connection.
    async fn drive(&mut self) -> Result<bool, RtmpError> {
        // Send a reconnect request once when shutdown was requested.
        if !self.reconnect_request_sent && self.cancel_token.as_ref().is_some_and(|token| token.is_cancelled()) {
            tracing::debug!("sending reconnect request");

            Command {
                command_type: CommandType::OnStatus(OnStatus {
                    code: codes::NET_CONNECTION_CONNECT_RECONNECT_REQUEST.to_string(),
                    level: CommandResultLevel::Status,
                    description: None,
                    others: None,
                }),
                transaction_id: 0.0,
            }
            .write(&mut self.write_buf, &mut self.chunk_writer, 0, AmfVersion::Amf0)?;

            self.reconnect_request_sent = true;
        }

        // If we have data ready to parse, parse it
        if self.skip_read {
            self.skip_read = false;
        } else {
            enum Driven {
                Read(usize),
                Media(Option<PlayMedia>),
            }

            self.read_buf.reserve(CHUNK_SIZE_DEFAULT);

            // The branch results leave the select before any session state
            // is touched; the pending branch futures hold field borrows.
            let driven = {
                let io = &mut self.io;
                let read_buf = &mut self.read_buf;
                let play_rx = &mut self.play_rx;

                tokio::select! {
                    read = io.read_buf(read_buf) => Driven::Read(read?),
                    media = play_rx.recv() => Driven::Media(media),
                }
            };

            match driven {
                Driven::Read(0) => return Ok(false),
                Driven::Read(n) => {
                    let n = n as u32;

                    // An acknowledgement is due whenever this read pushed the
                    // total past the next window boundary.
                    if (self.sequence_number % self.acknowledgement_window_size) + n >= self.acknowledgement_window_size {
                        tracing::debug!(sequence_number = %self.sequence_number, "sending acknowledgement");

                        ProtocolControlMessageAcknowledgement {
                            sequence_number: self.sequence_number,
                        }
                        .write(&mut self.write_buf, &mut self.chunk_writer)?;
                    }

                    // Wrap back to 0 when we reach u32::MAX
                    self.sequence_number = self.sequence_number.wrapping_add(n);
                }
                Driven::Media(media) => {
                    // The sender half held by the session keeps the channel
                    // alive, recv never returns None here.
                    if let Some(media) = media {
                        self.write_play_media(media)?;
                    }
                    return Ok(true);
                }
            }
        }

        self.process_chunks().await?;

        Ok(true)
    }

    /// Parses data from the client into RTMP messages and processes them.
    async fn process_chunks(&mut self) -> Result<(), RtmpError> {
        while let Some(chunk) = self.chunk_reader.read_chunk(&mut self.read_buf)? {
            let timestamp = chunk.message_header.timestamp;
            let msg_stream_id = chunk.message_header.msg_stream_id;

            let msg = MessageData::read(&chunk)?;
            self.process_message(msg, msg_stream_id, timestamp).await?;
        }

        Ok(())
    }

    /// Processes one RTMP message.
    async fn process_message(&mut self, msg: MessageData, stream_id: u32, timestamp: u32) -> Result<(), RtmpError> {
        match msg {
            MessageData::Command(command) => self.on_command_message(stream_id, command).await?,
            MessageData::SetChunkSize(msg) => {
                self.on_set_chunk_size(msg.chunk_size as usize)?;
            }
            MessageData::Abort(msg) => {
                self.chunk_reader.abort(msg.chunk_stream_id);
            }
            MessageData::Acknowledgement(msg) => {
                // Monotonically non-decreasing, modulo wrap-around.
                self.last_acknowledged = msg.sequence_number;
            }
            MessageData::SetAcknowledgementWindowSize(msg) => {
                tracing::debug!(window = %msg.acknowledgement_window_size, "received new acknowledgement window size");
                self.acknowledgement_window_size = msg.acknowledgement_window_size.max(1);
            }
            MessageData::SetPeerBandwidth(msg) => {
                // Answer with our window size, as the peer expects when the
                // value changes.
                ProtocolControlMessageWindowAcknowledgementSize {
                    acknowledgement_window_size: msg.acknowledgement_window_size,
                }
                .write(&mut self.write_buf, &mut self.chunk_writer)?;
            }
            MessageData::UserControlEvent(EventMessage::PingRequest { timestamp }) => {
                EventMessage::PingResponse { timestamp }.write(&mut self.write_buf, &mut self.chunk_writer)?;
            }
            MessageData::UserControlEvent(event) => {
                tracing::debug!(?event, "ignoring user control event");
            }
            MessageData::AudioData { data } => {
                self.handler
                    .on_data(stream_id, SessionData::Audio { timestamp, data })
                    .await?;
            }
            MessageData::VideoData { data } => {
                self.handler
                    .on_data(stream_id, SessionData::Video { timestamp, data })
                    .await?;
            }
            MessageData::DataAmf0 { data } => {
                self.handler.on_data(stream_id, SessionData::Amf0 { timestamp, data }).await?;
            }
            MessageData::Aggregate { messages } => {
                for sub in messages {
                    match sub.msg_type_id {
                        MessageType::Audio => {
                            self.handler
                                .on_data(
                                    stream_id,
                                    SessionData::Audio {
                                        timestamp: sub.timestamp,
                                        data: sub.data,
                                    },
                                )
                                .await?;
                        }
                        MessageType::Video => {
                            self.handler
                                .on_data(
                                    stream_id,
                                    SessionData::Video {
                                        timestamp: sub.timestamp,
                                        data: sub.data,
                                    },
                                )
                                .await?;
                        }
                        _ => {}
                    }
                }
            }
            MessageData::Unknown(unknown_message) => {
                self.handler.on_unknown_message(stream_id, unknown_message).await?;
            }
        }

        Ok(())
    }

    /// Announces and applies the outbound chunk size.
    fn send_set_chunk_size(&mut self) -> Result<(), RtmpError> {
        ProtocolControlMessageSetChunkSize {
            chunk_size: self.config.chunk_size as u32,
        }
        .write(&mut self.write_buf, &mut self.chunk_writer)?;
        self.chunk_writer.set_chunk_size(self.config.chunk_size);

        Ok(())
    }

    /// Handles a command message from the client.
    async fn on_command_message(&mut self, stream_id: u32, command: Command) -> Result<(), RtmpError> {
        match command.command_type {
            CommandType::NetConnection(NetConnectionCommand::Connect(connect)) => {
                self.on_command_connect(command.transaction_id, &connect.app).await?;
            }
            CommandType::NetConnection(NetConnectionCommand::CreateStream) => {
                self.on_command_create_stream(command.transaction_id)?;
            }
            CommandType::NetConnection(NetConnectionCommand::ReleaseStream { .. })
            | CommandType::NetConnection(NetConnectionCommand::FCPublish { .. })
            | CommandType::NetConnection(NetConnectionCommand::FCUnpublish { .. }) => {
                // fire-and-forget lifecycle hints, nothing to answer
            }
            CommandType::NetStream(NetStreamCommand::Play { stream_name, .. }) => {
                self.on_command_play(stream_id, command.transaction_id, &stream_name).await?;
            }
            CommandType::NetStream(NetStreamCommand::DeleteStream {
                stream_id: delete_stream_id,
            }) => {
                self.on_command_delete_stream(command.transaction_id, delete_stream_id).await?;
            }
            CommandType::NetStream(NetStreamCommand::CloseStream) => {
                // Not sure what this does, might be important
            }
            CommandType::NetStream(NetStreamCommand::Publish {
                publishing_name,
                publishing_type,
            }) => {
                self.on_command_publish(stream_id, command.transaction_id, &publishing_name, publishing_type)
                    .await?;
            }
            CommandType::Unknown(unknown_command) => {
                self.handler.on_unknown_command(stream_id, unknown_command).await?;
            }
            // ignore everything else
            _ => {}
        }

        Ok(())
    }

    /// Applies a set chunk size message from the client.
    fn on_set_chunk_size(&mut self, chunk_size: usize) -> Result<(), RtmpError> {
        if self.chunk_reader.update_max_chunk_size(chunk_size) {
            Ok(())
        } else {
            Err(RtmpError::Session(ServerSessionError::InvalidChunkSize(chunk_size)))
        }
    }

    /// Handles the connect command: the first command on every session.
    async fn on_command_connect(&mut self, transaction_id: f64, app: &str) -> Result<(), RtmpError> {
        let decision = self.handler.on_connect(app).await?;

        match decision {
            ConnectDecision::Accept { fmsver, capabilities } => {
                ProtocolControlMessageWindowAcknowledgementSize {
                    acknowledgement_window_size: self.config.window_ack_size,
                }
                .write(&mut self.write_buf, &mut self.chunk_writer)?;

                ProtocolControlMessageSetPeerBandwidth {
                    acknowledgement_window_size: self.config.window_ack_size,
                    limit_type: ProtocolControlMessageSetPeerBandwidthLimitType::Dynamic,
                }
                .write(&mut self.write_buf, &mut self.chunk_writer)?;

                EventMessage::StreamBegin { stream_id: 0 }.write(&mut self.write_buf, &mut self.chunk_writer)?;

                self.app_name = Some(app.to_string());

                let result = NetConnectionCommand::ConnectResult(NetConnectionCommandConnectResult {
                    fmsver,
                    capabilities,
                    ..Default::default()
                });

                Command {
                    command_type: CommandType::NetConnection(result),
                    transaction_id,
                }
                .write(&mut self.write_buf, &mut self.chunk_writer, 0, AmfVersion::Amf0)?;
            }
            ConnectDecision::Reject { code, description } => {
                tracing::debug!(code = %code, "rejecting connection");

                let information: freshet_amf::AmfObject = [
                    ("level", freshet_amf::AmfValue::String("error".to_string())),
                    ("code", freshet_amf::AmfValue::String(code)),
                    ("description", freshet_amf::AmfValue::String(description)),
                ]
                .into_iter()
                .collect();

                Command {
                    command_type: CommandType::Error {
                        values: vec![freshet_amf::AmfValue::Null, freshet_amf::AmfValue::Object(information)],
                    },
                    transaction_id,
                }
                .write(&mut self.write_buf, &mut self.chunk_writer, 0, AmfVersion::Amf0)?;
            }
        }

        Ok(())
    }

    /// Allocates a stream id for a createStream command.
    fn on_command_create_stream(&mut self, transaction_id: f64) -> Result<(), RtmpError> {
        let stream_id = self.config.stream_id_provider.create();

        Command {
            command_type: CommandType::NetConnection(NetConnectionCommand::CreateStreamResult {
                stream_id: stream_id as f64,
            }),
            transaction_id,
        }
        .write(&mut self.write_buf, &mut self.chunk_writer, 0, AmfVersion::Amf0)?;

        Ok(())
    }

    /// A deleteStream message tells the server the client is done with a
    /// stream; unknown ids are silently discarded.
    async fn on_command_delete_stream(&mut self, transaction_id: f64, delete_stream_id: f64) -> Result<(), RtmpError> {
        let stream_id = delete_stream_id as u32;

        if !self.config.stream_id_provider.has(stream_id) {
            tracing::debug!(stream_id = %stream_id, "deleteStream for unknown stream id");
            return Ok(());
        }

        self.config.stream_id_provider.delete(stream_id);
        self.playing_stream_ids.remove(&stream_id);

        if self.publishing_stream_ids.contains(&stream_id) {
            self.handler.on_unpublish(stream_id).await?;
            self.publishing_stream_ids.retain(|id| *id != stream_id);
        }

        Command {
            command_type: CommandType::OnStatus(OnStatus {
                level: CommandResultLevel::Status,
                code: codes::NET_STREAM_DELETE_STREAM_SUCCESS.to_string(),
                description: None,
                others: None,
            }),
            transaction_id,
        }
        .write(&mut self.write_buf, &mut self.chunk_writer, stream_id, AmfVersion::Amf0)?;

        Ok(())
    }

    /// Handles a publish command: the client wants to start streaming to
    /// the server.
    async fn on_command_publish(
        &mut self,
        stream_id: u32,
        transaction_id: f64,
        publishing_name: &str,
        _publishing_type: NetStreamCommandPublishPublishingType,
    ) -> Result<(), RtmpError> {
        let Some(app_name) = self.app_name.clone() else {
            return Err(RtmpError::Session(ServerSessionError::PublishBeforeConnect));
        };

        self.handler.on_publish(stream_id, &app_name, publishing_name).await?;

        self.publishing_stream_ids.push(stream_id);

        EventMessage::StreamBegin { stream_id }.write(&mut self.write_buf, &mut self.chunk_writer)?;

        Command {
            command_type: CommandType::OnStatus(OnStatus {
                level: CommandResultLevel::Status,
                code: codes::NET_STREAM_PUBLISH_START.to_string(),
                description: None,
                others: None,
            }),
            transaction_id,
        }
        .write(&mut self.write_buf, &mut self.chunk_writer, stream_id, AmfVersion::Amf0)?;

        Ok(())
    }

    /// Handles a play command: the client wants to receive a stream.
    async fn on_command_play(&mut self, stream_id: u32, transaction_id: f64, stream_name: &str) -> Result<(), RtmpError> {
        let Some(app_name) = self.app_name.clone() else {
            return Err(RtmpError::Session(ServerSessionError::PlayBeforeConnect));
        };

        self.handler
            .on_play(stream_id, &app_name, stream_name, self.play_tx.clone())
            .await?;

        self.playing_stream_ids.insert(stream_id);

        EventMessage::StreamBegin { stream_id }.write(&mut self.write_buf, &mut self.chunk_writer)?;

        for code in [codes::NET_STREAM_PLAY_RESET, codes::NET_STREAM_PLAY_START] {
            Command {
                command_type: CommandType::OnStatus(OnStatus {
                    level: CommandResultLevel::Status,
                    code: code.to_string(),
                    description: None,
                    others: None,
                }),
                transaction_id,
            }
            .write(&mut self.write_buf, &mut self.chunk_writer, stream_id, AmfVersion::Amf0)?;
        }

        Ok(())
    }

    /// Writes one piece of application media to a playing stream.
    fn write_play_media(&mut self, media: PlayMedia) -> Result<(), RtmpError> {
        if !self.playing_stream_ids.contains(&media.stream_id) {
            tracing::debug!(stream_id = %media.stream_id, "dropping media for non-playing stream");
            return Ok(());
        }

        let (csid, msg_type_id, timestamp, data) = match media.data {
            SessionData::Audio { timestamp, data } => (CHUNK_STREAM_ID_AUDIO, MessageType::Audio, timestamp, data),
            SessionData::Video { timestamp, data } => (CHUNK_STREAM_ID_VIDEO, MessageType::Video, timestamp, data),
            SessionData::Amf0 { timestamp, data } => (CHUNK_STREAM_ID_DATA, MessageType::DataAMF0, timestamp, data),
        };

        self.chunk_writer
            .write_chunk(&mut self.write_buf, Chunk::new(csid, timestamp, msg_type_id, media.stream_id, data))?;

        Ok(())
    }

    async fn flush(&mut self) -> Result<(), RtmpError> {
        if !self.write_buf.is_empty() {
            tokio::time::timeout(Duration::from_secs(2), self.io.write_all(self.write_buf.as_ref()))
                .await
                .map_err(ServerSessionError::Timeout)??;
            self.write_buf.clear();
        }

        Ok(())
    }
}
