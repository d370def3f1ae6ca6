use bytes::Bytes;

/// Strips a leading Annex-B start code (`00 00 01` or `00 00 00 01`) from a
/// NAL unit, returning the bare unit ready for length-prefixed (AVCC) use.
///
/// Data without a start code is returned unchanged.
pub fn strip_start_code(nal: Bytes) -> Bytes {
    if nal.len() >= 4 && nal[..4] == [0, 0, 0, 1] {
        nal.slice(4..)
    } else if nal.len() >= 3 && nal[..3] == [0, 0, 1] {
        nal.slice(3..)
    } else {
        nal
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::Bytes;

    use super::strip_start_code;

    #[test]
    fn strips_both_start_code_forms() {
        assert_eq!(
            strip_start_code(Bytes::from_static(&[0, 0, 0, 1, 0x67, 0x64])),
            Bytes::from_static(&[0x67, 0x64])
        );
        assert_eq!(
            strip_start_code(Bytes::from_static(&[0, 0, 1, 0x68, 0xEB])),
            Bytes::from_static(&[0x68, 0xEB])
        );
    }

    #[test]
    fn leaves_bare_nal_untouched() {
        let nal = Bytes::from_static(&[0x67, 0x64, 0x00, 0x1F]);
        assert_eq!(strip_start_code(nal.clone()), nal);
    }

    #[test]
    fn short_input() {
        let nal = Bytes::from_static(&[0, 0]);
        assert_eq!(strip_start_code(nal.clone()), nal);
    }
}
