//! Big-endian primitive decoding over a sequential byte stream.
//!
//! Whisper files are a packed sequence of big-endian `u32` fields and `f64`
//! values stored as raw IEEE-754 bits. [`BinaryReader`] consumes them in file
//! order from any [`Read`] source and tracks how many bytes it has consumed,
//! so a short read can be reported at the exact offset where input ran out.
//!
//! The reader does no buffering of its own. Wrap files in a
//! [`std::io::BufReader`] before handing them over; in-memory slices can be
//! read directly.

use std::io::{self, Read};

use crate::error::{DecodeError, DecodeResult, DecodeStage};

/// Sequential big-endian reader over a byte source.
#[derive(Debug)]
pub struct BinaryReader<R> {
    inner: R,
    /// Number of bytes consumed so far.
    offset: u64,
}

impl<R: Read> BinaryReader<R> {
    /// Wraps a byte source, starting at offset zero.
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Wraps a byte source that has already been advanced to `offset`.
    ///
    /// Only affects the offsets reported in errors.
    pub fn with_offset(inner: R, offset: u64) -> Self {
        Self { inner, offset }
    }

    /// Returns the number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads a big-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TruncatedInput`] if fewer than 4 bytes remain,
    /// or [`DecodeError::Io`] if the source fails.
    pub fn read_u32(&mut self, stage: DecodeStage) -> DecodeResult<u32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf, stage)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Reads 8 big-endian bytes and reinterprets them as an `f64`.
    ///
    /// The bit pattern is preserved exactly, including NaN payloads,
    /// infinities, and negative zero.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TruncatedInput`] if fewer than 8 bytes remain,
    /// or [`DecodeError::Io`] if the source fails.
    pub fn read_f64_bits(&mut self, stage: DecodeStage) -> DecodeResult<f64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf, stage)?;
        Ok(f64::from_bits(u64::from_be_bytes(buf)))
    }

    fn fill(&mut self, buf: &mut [u8], stage: DecodeStage) -> DecodeResult<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(DecodeError::TruncatedInput {
                    stage,
                    offset: self.offset,
                    needed: buf.len(),
                })
            }
            Err(e) => Err(DecodeError::Io {
                stage,
                offset: self.offset,
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u32_big_endian() {
        let bytes = [0x00, 0x00, 0x01, 0x00, 0xde, 0xad, 0xbe, 0xef];
        let mut reader = BinaryReader::new(&bytes[..]);

        assert_eq!(reader.read_u32(DecodeStage::Header).unwrap(), 256);
        assert_eq!(reader.read_u32(DecodeStage::Header).unwrap(), 0xdead_beef);
        assert_eq!(reader.offset(), 8);
    }

    #[test]
    fn test_read_f64_bits_preserves_patterns() {
        let stage = DecodeStage::Point { archive: 0, slot: 0 };
        let nan_bits: u64 = 0x7ff8_0000_dead_beef;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&42.5f64.to_bits().to_be_bytes());
        bytes.extend_from_slice(&nan_bits.to_be_bytes());
        bytes.extend_from_slice(&(-0.0f64).to_bits().to_be_bytes());
        bytes.extend_from_slice(&f64::NEG_INFINITY.to_bits().to_be_bytes());

        let mut reader = BinaryReader::new(bytes.as_slice());
        assert_eq!(reader.read_f64_bits(stage).unwrap(), 42.5);

        let nan = reader.read_f64_bits(stage).unwrap();
        assert!(nan.is_nan());
        assert_eq!(nan.to_bits(), nan_bits);

        let neg_zero = reader.read_f64_bits(stage).unwrap();
        assert_eq!(neg_zero.to_bits(), (-0.0f64).to_bits());

        assert_eq!(reader.read_f64_bits(stage).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_truncated_u32_reports_offset() {
        let bytes = [0, 0, 0, 1, 0, 0];
        let mut reader = BinaryReader::new(&bytes[..]);
        reader.read_u32(DecodeStage::Header).unwrap();

        let err = reader.read_u32(DecodeStage::Header).unwrap_err();
        match err {
            DecodeError::TruncatedInput { stage, offset, needed } => {
                assert_eq!(stage, DecodeStage::Header);
                assert_eq!(offset, 4);
                assert_eq!(needed, 4);
            }
            other => panic!("expected TruncatedInput, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_f64() {
        let stage = DecodeStage::Point { archive: 1, slot: 3 };
        let bytes = [0u8; 7];
        let mut reader = BinaryReader::with_offset(&bytes[..], 100);

        let err = reader.read_f64_bits(stage).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TruncatedInput { offset: 100, needed: 8, .. }
        ));
        assert_eq!(err.stage(), stage);
    }

    #[test]
    fn test_source_error_is_io() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            }
        }

        let mut reader = BinaryReader::new(Failing);
        let err = reader.read_u32(DecodeStage::Header).unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }
}
