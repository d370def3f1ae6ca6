//! AAC configuration handling: the MPEG-4 `AudioSpecificConfig` and the
//! ADTS frame header, as far as an FLV/RTMP muxer needs them.
//!
//! No audio decoding happens here; the only bitstream work is pulling the
//! handful of header fields required to describe a stream to a peer.
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

mod adts;
mod config;
mod error;

pub use adts::AdtsHeader;
pub use config::{AudioObjectType, AudioSpecificConfig, SAMPLE_FREQUENCIES};
pub use error::AacError;
