//! AVC (H.264) decoder configuration record handling.
//!
//! This crate only concerns itself with the `AVCDecoderConfigurationRecord`
//! carried by FLV/RTMP sequence headers; it does not parse SPS/PPS
//! bitstreams beyond the three bytes the record copies out of the SPS.
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

mod config;
mod error;
mod nal;

pub use config::{AVCDecoderConfigurationRecord, AvccExtendedConfig};
pub use error::H264Error;
pub use nal::strip_start_code;
