//! HEVC (H.265) decoder configuration record handling.
//!
//! Like its AVC sibling, this crate stops at the
//! `HEVCDecoderConfigurationRecord` container; parameter-set bitstreams are
//! carried opaque.
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

mod config;
mod error;

pub use config::{HEVCDecoderConfigurationRecord, NaluArray, NaluType};
pub use error::H265Error;
