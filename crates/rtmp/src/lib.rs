//! An RTMP implementation with client and server roles: chunk stream
//! framing, message and command layers, simple and complex handshakes, and
//! sessions over TCP, TLS or HTTP-tunneled (RTMPT) transports.
//!
//! ## Specifications
//!
//! | Name | Version |
//! | --- | --- |
//! | Adobe RTMP Specification | `1.0` (referred to as 'Legacy RTMP spec') |
//! | Enhanced RTMP | `v2-2024-10-22-b1` (referred to as 'Enhanced RTMP spec') |
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

pub mod chunk;
pub mod clock;
pub mod command_messages;
pub mod error;
pub mod handshake;
pub mod messages;
pub mod protocol_control_messages;
pub mod session;
pub mod transport;
pub mod url;
pub mod user_control_messages;

pub use clock::{MonotonicClock, RtmpClock, SharedClock};
pub use error::RtmpError;
pub use session::client::{ClientSession, ClientSessionConfig, ClientSessionError, Publisher, SessionEvent};
pub use session::server::{
    ConnectDecision, ServerSession, ServerSessionConfig, ServerSessionError, SessionData, SessionHandler,
};
pub use url::{RtmpScheme, RtmpUrl};

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::sync::{mpsc, oneshot};

    use crate::command_messages::netstream::NetStreamCommandPublishPublishingType;
    use crate::session::client::{ClientSession, ClientSessionConfig};
    use crate::session::server::{ConnectDecision, PlaySender, ServerSession, SessionData, SessionHandler};
    use crate::url::RtmpUrl;

    enum Event {
        Connect {
            app: String,
        },
        Publish {
            stream_id: u32,
            app_name: String,
            stream_name: String,
        },
        Play {
            stream_id: u32,
            stream_name: String,
            media: PlaySender,
        },
        Unpublish {
            stream_id: u32,
        },
        Data {
            stream_id: u32,
            data: SessionData,
        },
    }

    struct Handler(mpsc::UnboundedSender<Event>);

    impl SessionHandler for Handler {
        async fn on_connect(&self, app: &str) -> Result<ConnectDecision, crate::RtmpError> {
            self.0.send(Event::Connect { app: app.to_string() }).unwrap();
            Ok(ConnectDecision::default())
        }

        async fn on_publish(&self, stream_id: u32, app_name: &str, stream_name: &str) -> Result<(), crate::RtmpError> {
            self.0
                .send(Event::Publish {
                    stream_id,
                    app_name: app_name.to_string(),
                    stream_name: stream_name.to_string(),
                })
                .unwrap();
            Ok(())
        }

        async fn on_play(
            &self,
            stream_id: u32,
            _app_name: &str,
            stream_name: &str,
            media: PlaySender,
        ) -> Result<(), crate::RtmpError> {
            self.0
                .send(Event::Play {
                    stream_id,
                    stream_name: stream_name.to_string(),
                    media,
                })
                .unwrap();
            Ok(())
        }

        async fn on_unpublish(&self, stream_id: u32) -> Result<(), crate::RtmpError> {
            self.0.send(Event::Unpublish { stream_id }).unwrap();
            Ok(())
        }

        async fn on_data(&self, stream_id: u32, data: SessionData) -> Result<(), crate::RtmpError> {
            self.0.send(Event::Data { stream_id, data }).unwrap();
            Ok(())
        }
    }

    fn client_config() -> ClientSessionConfig {
        ClientSessionConfig {
            command_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn publish_end_to_end() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let server = tokio::spawn(ServerSession::new(server_io, Handler(events_tx)).run());

        let url = RtmpUrl::parse("rtmp://localhost/live/stream-key").unwrap();
        let mut client = ClientSession::new(client_io, url, client_config()).unwrap();

        client.connect().await.expect("connect");
        client
            .publish(NetStreamCommandPublishPublishingType::Live)
            .await
            .expect("publish");

        let stream_id = client.stream_id().expect("stream id allocated");
        assert_eq!(stream_id, 3); // first id of the sequential provider

        // metadata, then an audio sequence header and a raw frame at the
        // same timestamp
        let metadata = [("audiocodecid", freshet_amf::AmfValue::Number(10.0))].into_iter().collect();
        client.write_set_data_frame(&metadata).await.expect("set data frame");
        assert!(client.write_audio(0, Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10])).await.unwrap());
        assert!(client.write_audio(0, Bytes::from_static(&[0xAF, 0x01, 0xAA])).await.unwrap());

        client.close().await.expect("close");

        // the server observed the whole sequence
        let mut saw_connect = false;
        let mut saw_publish = false;
        let mut audio_messages = 0;
        let mut saw_metadata = false;

        while let Some(event) = events_rx.recv().await {
            match event {
                Event::Connect { app } => {
                    assert_eq!(app, "live");
                    saw_connect = true;
                }
                Event::Publish {
                    stream_id,
                    app_name,
                    stream_name,
                } => {
                    assert_eq!(stream_id, 3);
                    assert_eq!(app_name, "live");
                    assert_eq!(stream_name, "stream-key");
                    saw_publish = true;
                }
                Event::Data { stream_id, data } => {
                    assert_eq!(stream_id, 3);
                    match data {
                        SessionData::Audio { timestamp, .. } => {
                            assert_eq!(timestamp, 0);
                            audio_messages += 1;
                        }
                        SessionData::Amf0 { .. } => saw_metadata = true,
                        SessionData::Video { .. } => panic!("no video was sent"),
                    }
                }
                Event::Unpublish { .. } | Event::Play { .. } => {}
            }
        }

        assert!(saw_connect);
        assert!(saw_publish);
        assert!(saw_metadata);
        assert_eq!(audio_messages, 2);

        server.await.expect("server task").expect("server result");
    }

    #[tokio::test]
    async fn split_publisher_runs_concurrently() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let server = tokio::spawn(ServerSession::new(server_io, Handler(events_tx)).run());

        let url = RtmpUrl::parse("rtmp://localhost/live/split-key").unwrap();
        let mut client = ClientSession::new(client_io, url, client_config()).unwrap();

        client.connect().await.expect("connect");
        client
            .publish(NetStreamCommandPublishPublishingType::Live)
            .await
            .expect("publish");

        let (driver, mut publisher) = client.split().expect("split in publishing state");
        let driver = tokio::spawn(driver.run());

        for timestamp in [0u32, 20, 40] {
            assert!(publisher.write_video(timestamp, Bytes::from_static(&[0x17, 0x01])).await.unwrap());
        }

        publisher.close().await.expect("close");

        let mut video_messages = 0;
        while let Some(event) = events_rx.recv().await {
            if let Event::Data {
                data: SessionData::Video { .. },
                ..
            } = event
            {
                video_messages += 1;
            }
        }

        assert_eq!(video_messages, 3);

        driver.await.expect("driver task").expect("driver result");
        server.await.expect("server task").expect("server result");
    }

    #[tokio::test]
    async fn play_receives_media() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let server = tokio::spawn(ServerSession::new(server_io, Handler(events_tx)).run());

        let url = RtmpUrl::parse("rtmp://localhost/live/play-key").unwrap();
        let mut client = ClientSession::new(client_io, url, client_config()).unwrap();

        client.connect().await.expect("connect");

        let (media_ready_tx, media_ready_rx) = oneshot::channel();

        // feed one video frame once the server hands out the play sender
        let feeder = tokio::spawn(async move {
            let mut sender = None;
            while let Some(event) = events_rx.recv().await {
                if let Event::Play { stream_id, stream_name, media } = event {
                    assert_eq!(stream_name, "play-key");
                    sender = Some((stream_id, media));
                    break;
                }
            }

            let (stream_id, media) = sender.expect("play dispatched");
            media
                .send(crate::session::server::PlayMedia {
                    stream_id,
                    data: SessionData::Video {
                        timestamp: 40,
                        data: Bytes::from_static(&[0x17, 0x01, 0x00]),
                    },
                })
                .await
                .unwrap();

            let _ = media_ready_tx.send(());
        });

        client.play().await.expect("play");

        let media = client.recv_media().await.expect("media arrives");
        let SessionData::Video { timestamp, data } = media else {
            panic!("expected video");
        };
        assert_eq!(timestamp, 40);
        assert_eq!(data, Bytes::from_static(&[0x17, 0x01, 0x00]));

        media_ready_rx.await.expect("feeder finished");
        feeder.await.expect("feeder task");

        client.close().await.expect("close");
        server.await.expect("server task").expect("server result");
    }

    #[tokio::test]
    async fn flv_muxed_frames_over_rtmp() {
        use freshet_flv::mux::{FlvMuxer, MediaCodec, MediaFrame};
        use freshet_flv::tag::FlvTagData;

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let server = tokio::spawn(ServerSession::new(server_io, Handler(events_tx)).run());

        let url = RtmpUrl::parse("rtmp://localhost/live/flv-key").unwrap();
        let mut client = ClientSession::new(client_io, url, client_config()).unwrap();

        client.connect().await.expect("connect");
        client
            .publish(NetStreamCommandPublishPublishingType::Live)
            .await
            .expect("publish");

        // a full ADTS frame; the muxer unwraps it and emits the sequence
        // header first
        let mut adts = vec![0xFF, 0xF1, 0x50, 0x80, 0x01, 0x3F, 0xFC];
        adts.extend_from_slice(&[0xAA, 0xBB]);

        let mut muxer = FlvMuxer::new();
        let tags = muxer
            .write_frame(MediaFrame {
                codec: MediaCodec::Aac,
                timestamp_ms: 0,
                keyframe: false,
                composition_time_offset: 0,
                payload: Bytes::from(adts),
                descriptor: None,
            })
            .expect("mux");

        assert_eq!(tags.len(), 2);

        // an RTMP audio message payload is exactly the FLV tag body
        for tag in &tags {
            let mut body = Vec::new();
            tag.data.mux(&mut body).expect("tag body");
            assert!(matches!(tag.data, FlvTagData::Audio(_)));
            assert!(client.write_audio(tag.timestamp_ms, Bytes::from(body)).await.unwrap());
        }

        client.close().await.expect("close");

        let mut audio = Vec::new();
        while let Some(event) = events_rx.recv().await {
            if let Event::Data {
                data: SessionData::Audio { data, .. },
                ..
            } = event
            {
                audio.push(data);
            }
        }

        assert_eq!(audio.len(), 2);
        // sequence header: AAC, packet type 0, AudioSpecificConfig
        assert_eq!(audio[0].as_ref(), &[0xAF, 0x00, 0x12, 0x10]);
        // raw frame: the ADTS payload without its header
        assert_eq!(audio[1].as_ref(), &[0xAF, 0x01, 0xAA, 0xBB]);

        server.await.expect("server task").expect("server result");
    }

    #[tokio::test]
    async fn rejected_connect_surfaces_code_and_description() {
        struct Rejecting;

        impl SessionHandler for Rejecting {
            async fn on_connect(&self, _app: &str) -> Result<ConnectDecision, crate::RtmpError> {
                Ok(ConnectDecision::Reject {
                    code: "NetConnection.Connect.Rejected".to_string(),
                    description: "no such app".to_string(),
                })
            }

            async fn on_publish(&self, _: u32, _: &str, _: &str) -> Result<(), crate::RtmpError> {
                unreachable!()
            }

            async fn on_play(&self, _: u32, _: &str, _: &str, _: PlaySender) -> Result<(), crate::RtmpError> {
                unreachable!()
            }

            async fn on_unpublish(&self, _: u32) -> Result<(), crate::RtmpError> {
                Ok(())
            }

            async fn on_data(&self, _: u32, _: SessionData) -> Result<(), crate::RtmpError> {
                Ok(())
            }
        }

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let _server = tokio::spawn(ServerSession::new(server_io, Rejecting).run());

        let url = RtmpUrl::parse("rtmp://localhost/nope/key").unwrap();
        let mut client = ClientSession::new(client_io, url, client_config()).unwrap();

        let err = client.connect().await.expect_err("connect must fail");
        let crate::RtmpError::ClientSession(crate::ClientSessionError::Rejected { code, description }) = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(code, "NetConnection.Connect.Rejected");
        assert_eq!(description, "no such app");
    }

    #[tokio::test]
    async fn late_frames_are_dropped_with_telemetry() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (events_tx, _events_rx) = mpsc::unbounded_channel();

        let _server = tokio::spawn(ServerSession::new(server_io, Handler(events_tx)).run());

        let dropped = Arc::new(AtomicUsize::new(0));
        let counter = dropped.clone();

        let config = ClientSessionConfig {
            command_timeout: Duration::from_secs(2),
            late_frame_drop_threshold_ms: Some(500),
            on_frame_dropped: Some(Arc::new(move |_frame| {
                counter.fetch_add(1, Ordering::Relaxed);
            })),
            ..Default::default()
        };

        let url = RtmpUrl::parse("rtmp://localhost/live/drop-key").unwrap();
        let mut client = ClientSession::new(client_io, url, config).unwrap();

        client.connect().await.expect("connect");
        client
            .publish(NetStreamCommandPublishPublishingType::Live)
            .await
            .expect("publish");

        assert!(client.write_video(10_000, Bytes::from_static(&[0x17])).await.unwrap());
        // within the threshold: sent
        assert!(client.write_video(9_800, Bytes::from_static(&[0x27])).await.unwrap());
        // too late: dropped
        assert!(!client.write_video(5_000, Bytes::from_static(&[0x27])).await.unwrap());

        assert_eq!(dropped.load(Ordering::Relaxed), 1);

        client.close().await.expect("close");
    }
}
