//! TFRecord framing writer.

use std::io::{self, Write};

/// Constant added after rotating a CRC, as in TensorFlow's `crc32c::Mask`.
const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC32C of `data`, rotated right by 15 bits and offset by [`MASK_DELTA`].
pub fn masked_crc32c(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Writes length-delimited, checksummed records.
///
/// Each record is laid out as:
///
/// ```text
/// u64 length (LE) | u32 masked_crc(length) (LE) | payload | u32 masked_crc(payload) (LE)
/// ```
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes one framed record.
    pub fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        let len = (payload.len() as u64).to_le_bytes();
        self.inner.write_all(&len)?;
        self.inner.write_all(&masked_crc32c(&len).to_le_bytes())?;
        self.inner.write_all(payload)?;
        self.inner.write_all(&masked_crc32c(payload).to_le_bytes())
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
