//! TFRecord framing reader.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use super::writer::masked_crc32c;
use crate::error::CamtrapError;

/// Iterates over the payloads of a TFRecord stream, verifying both checksums.
#[derive(Debug)]
pub struct RecordReader<R: Read> {
    inner: R,
    path: PathBuf,
    offset: u64,
    done: bool,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, CamtrapError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: Read> RecordReader<R> {
    /// Wraps a reader; `path` is only used in error messages.
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            offset: 0,
            done: false,
        }
    }

    fn corrupt(&self, message: impl Into<String>) -> CamtrapError {
        CamtrapError::CorruptRecord {
            path: self.path.clone(),
            offset: self.offset,
            message: message.into(),
        }
    }

    fn read_record(&mut self) -> Result<Option<Vec<u8>>, CamtrapError> {
        let mut header = [0u8; 12];
        let filled = read_full(&mut self.inner, &mut header)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < header.len() {
            return Err(self.corrupt("truncated record header"));
        }

        let mut len_bytes = [0u8; 8];
        let mut len_crc = [0u8; 4];
        len_bytes.copy_from_slice(&header[..8]);
        len_crc.copy_from_slice(&header[8..]);
        if masked_crc32c(&len_bytes) != u32::from_le_bytes(len_crc) {
            return Err(self.corrupt("length checksum mismatch"));
        }

        let len = usize::try_from(u64::from_le_bytes(len_bytes))
            .map_err(|_| self.corrupt("record length does not fit in memory"))?;

        let mut payload = Vec::new();
        (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut payload)?;
        if payload.len() < len {
            return Err(self.corrupt("truncated record payload"));
        }

        let mut footer = [0u8; 4];
        if read_full(&mut self.inner, &mut footer)? < footer.len() {
            return Err(self.corrupt("truncated record footer"));
        }
        if masked_crc32c(&payload) != u32::from_le_bytes(footer) {
            return Err(self.corrupt("payload checksum mismatch"));
        }

        self.offset += 12 + len as u64 + 4;
        Ok(Some(payload))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Vec<u8>, CamtrapError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.read_record().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.done = true;
        }
        result
    }
}

/// Reads until `buf` is full or EOF; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads every payload in a record file.
pub fn read_records(path: &Path) -> Result<Vec<Vec<u8>>, CamtrapError> {
    RecordReader::open(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfrecord::RecordWriter;

    fn framed(payloads: &[&[u8]]) -> Vec<u8> {
        let mut writer = RecordWriter::new(Vec::new());
        for payload in payloads {
            writer.write_record(payload).expect("write");
        }
        writer.finish().expect("finish")
    }

    #[test]
    fn reads_back_written_records() {
        let bytes = framed(&[b"one", b"", b"three"]);
        let records: Vec<Vec<u8>> = RecordReader::new(bytes.as_slice(), "mem")
            .collect::<Result<_, _>>()
            .expect("read");
        assert_eq!(records, vec![b"one".to_vec(), Vec::new(), b"three".to_vec()]);
    }

    #[test]
    fn empty_stream_has_no_records() {
        let mut reader = RecordReader::new(&[][..], "mem");
        assert!(reader.next().is_none());
    }

    #[test]
    fn flipped_payload_byte_is_detected() {
        let mut bytes = framed(&[b"payload"]);
        bytes[14] ^= 0xff;
        let err = RecordReader::new(bytes.as_slice(), "mem")
            .next()
            .expect("one item")
            .unwrap_err();
        assert!(matches!(err, CamtrapError::CorruptRecord { .. }));
    }

    #[test]
    fn truncated_stream_is_detected_and_iteration_stops() {
        let mut bytes = framed(&[b"first", b"second"]);
        bytes.truncate(bytes.len() - 3);
        let mut reader = RecordReader::new(bytes.as_slice(), "mem");
        assert_eq!(reader.next().expect("first").expect("ok"), b"first");
        assert!(matches!(
            reader.next(),
            Some(Err(CamtrapError::CorruptRecord { offset: 21, .. }))
        ));
        assert!(reader.next().is_none());
    }
}
