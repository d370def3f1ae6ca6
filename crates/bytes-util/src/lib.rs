//! Byte cursor and bit-level helpers shared by the freshet codecs.
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

mod bit_read;
mod bit_write;
mod cursor;

pub use bit_read::BitReader;
pub use bit_write::BitWriter;
pub use cursor::BytesCursorExt;
