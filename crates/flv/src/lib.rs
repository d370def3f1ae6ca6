//! A pure Rust implementation of the FLV container, supporting demuxing and
//! muxing of files and streams.
//!
//! Legacy tag shapes cover H.263/AVC video and the classic audio formats
//! including AAC; the enhanced (E-RTMP) video pipeline adds the
//! FourCC-signalled codecs (AV1, VP9, HEVC, and AVC/HEVC in FourCC form).
//!
//! ## Specifications
//!
//! | Name | Version |
//! | --- | --- |
//! | Adobe Flash Video File Format Specification | `10.1` (referred to as 'Legacy FLV spec') |
//! | Enhanced RTMP | `v2-2024-10-22-b1` (referred to as 'Enhanced RTMP spec') |
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

pub mod audio;
pub mod common;
pub mod error;
pub mod file;
pub mod header;
pub mod mux;
pub mod script;
pub mod tag;
pub mod video;

pub use error::FlvError;
