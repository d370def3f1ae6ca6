use std::io;

use bytes::Bytes;

/// Zero-copy extraction helpers for a [`io::Cursor`] over [`Bytes`].
///
/// The returned [`Bytes`] share the cursor's underlying buffer.
pub trait BytesCursorExt {
    /// Extracts the next `size` bytes and advances the cursor.
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] if fewer than `size`
    /// bytes remain.
    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes>;

    /// Extracts all remaining bytes, leaving the cursor at the end.
    fn extract_remaining(&mut self) -> Bytes;
}

impl BytesCursorExt for io::Cursor<Bytes> {
    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes> {
        let position = self.position() as usize;

        if size > self.get_ref().len().saturating_sub(position) {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes in cursor"));
        }

        let bytes = self.get_ref().slice(position..position + size);
        self.set_position((position + size) as u64);

        Ok(bytes)
    }

    fn extract_remaining(&mut self) -> Bytes {
        let position = (self.position() as usize).min(self.get_ref().len());
        let bytes = self.get_ref().slice(position..);
        self.set_position(self.get_ref().len() as u64);

        bytes
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::io;

    use bytes::Bytes;

    use super::BytesCursorExt;

    #[test]
    fn extract_bytes() {
        let mut cursor = io::Cursor::new(Bytes::from_static(&[1, 2, 3, 4, 5]));

        assert_eq!(cursor.extract_bytes(2).unwrap(), Bytes::from_static(&[1, 2]));
        assert_eq!(cursor.extract_bytes(0).unwrap(), Bytes::new());
        assert_eq!(cursor.extract_bytes(3).unwrap(), Bytes::from_static(&[3, 4, 5]));

        let err = cursor.extract_bytes(1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn extract_remaining() {
        let mut cursor = io::Cursor::new(Bytes::from_static(&[1, 2, 3]));

        assert_eq!(cursor.extract_bytes(1).unwrap(), Bytes::from_static(&[1]));
        assert_eq!(cursor.extract_remaining(), Bytes::from_static(&[2, 3]));
        assert_eq!(cursor.extract_remaining(), Bytes::new());
    }
}
